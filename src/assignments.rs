use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::GradeError;
use crate::models::{Assignment, AssignmentType};
use crate::scale;

/// A grade as submitted by a professor, before validation.
#[derive(Debug, Clone)]
pub struct AssignmentDraft {
    pub enrollment_id: Uuid,
    pub kind: AssignmentType,
    pub name: String,
    pub score: f64,
    pub comments: Option<String>,
    pub graded_date: NaiveDate,
    pub days_late: u32,
}

/// Validate a submitted grade and turn it into a stored assignment.
///
/// The raw score must already be within 0-100; the late penalty is applied
/// afterwards so a penalized score can never leave that range.
pub fn record_assignment(
    draft: AssignmentDraft,
    late_penalty_percent_per_day: Option<f64>,
) -> Result<Assignment, GradeError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(GradeError::Validation(
            "assignment name must not be blank".to_string(),
        ));
    }
    scale::check_score(draft.score)?;

    let score = match late_penalty_percent_per_day {
        Some(percent) => apply_late_penalty(draft.score, draft.days_late, percent),
        None => draft.score,
    };

    let comments = draft
        .comments
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    Ok(Assignment {
        id: Uuid::new_v4(),
        enrollment_id: draft.enrollment_id,
        kind: draft.kind,
        name: name.to_string(),
        score,
        comments,
        graded_date: draft.graded_date,
    })
}

/// Replace the score of an existing assignment, re-validating the range.
pub fn update_score(assignment: &mut Assignment, score: f64) -> Result<(), GradeError> {
    scale::check_score(score)?;
    assignment.score = score;
    Ok(())
}

pub fn apply_late_penalty(score: f64, days_late: u32, percent_per_day: f64) -> f64 {
    if days_late == 0 || percent_per_day <= 0.0 {
        return score;
    }
    let penalty = percent_per_day / 100.0 * days_late as f64 * score;
    (score - penalty).max(0.0)
}

pub fn check_credits(credits: u32) -> Result<(), GradeError> {
    if credits == 0 {
        Err(GradeError::Validation(
            "credits must be greater than zero".to_string(),
        ))
    } else {
        Ok(())
    }
}
