use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GradeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GradeScaleEntry {
    pub label: String,
    pub min_score: f64,
    pub max_score: f64,
    pub grade_point: f64,
}

impl GradeScaleEntry {
    pub fn new(label: &str, min_score: f64, max_score: f64, grade_point: f64) -> Self {
        Self {
            label: label.to_string(),
            min_score,
            max_score,
            grade_point,
        }
    }
}

/// Result of normalizing a single score against a scale.
#[derive(Debug, Clone, PartialEq)]
pub struct LetterGrade {
    pub label: String,
    pub grade_point: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentType {
    Exam,
    Assignment,
    Quiz,
    Project,
}

impl AssignmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentType::Exam => "exam",
            AssignmentType::Assignment => "assignment",
            AssignmentType::Quiz => "quiz",
            AssignmentType::Project => "project",
        }
    }
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentType {
    type Err = GradeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exam" => Ok(AssignmentType::Exam),
            "assignment" => Ok(AssignmentType::Assignment),
            "quiz" => Ok(AssignmentType::Quiz),
            "project" => Ok(AssignmentType::Project),
            other => Err(GradeError::Validation(format!(
                "unknown assignment type '{other}' (expected exam, assignment, quiz or project)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    #[serde(rename = "type")]
    pub kind: AssignmentType,
    pub name: String,
    pub score: f64,
    pub comments: Option<String>,
    pub graded_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Dropped => "dropped",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = GradeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(EnrollmentStatus::Active),
            "completed" => Ok(EnrollmentStatus::Completed),
            "dropped" => Ok(EnrollmentStatus::Dropped),
            other => Err(GradeError::Validation(format!(
                "unknown enrollment status '{other}'"
            ))),
        }
    }
}

/// Fixed grade awarded for credit earned elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCredit {
    pub label: String,
    pub grade_point: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub course_code: String,
    pub semester: String,
    pub credits: u32,
    pub status: EnrollmentStatus,
    pub transfer: Option<TransferCredit>,
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub program: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseGradeSummary {
    pub enrollment_id: Uuid,
    pub course_id: Uuid,
    pub course_code: String,
    pub semester: String,
    pub average: Option<f64>,
    pub letter_grade: Option<String>,
    pub grade_point: Option<f64>,
    pub credits: u32,
    pub transfer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpaResult {
    pub student_id: Uuid,
    pub gpa: f64,
    pub breakdown: Vec<CourseGradeSummary>,
}

/// Display shape served to dashboards: numbers rounded to two decimals.
#[derive(Debug, Clone, Serialize)]
pub struct GpaView {
    pub gpa: f64,
    pub breakdown: Vec<CourseView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub course: String,
    pub credits: u32,
    pub average: Option<f64>,
    pub letter_grade: Option<String>,
}
