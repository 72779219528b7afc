//! Grade normalization and GPA aggregation for the Group Scholar gradebook.
//!
//! [`scale`] turns raw scores into letter grades and grade points,
//! [`gpa`] rolls a student's enrollments up into a GPA. Both are pure; the
//! [`db`] module supplies them with a consistent snapshot from Postgres.

pub mod assignments;
pub mod config;
pub mod db;
pub mod error;
pub mod gpa;
pub mod models;
pub mod report;
pub mod scale;

pub use error::GradeError;
pub use gpa::{compute_gpa, GpaOptions};
pub use scale::{letter_and_point, GradeScale};
