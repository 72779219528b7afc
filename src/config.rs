use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::GradeError;
use crate::gpa::GpaOptions;
use crate::models::GradeScaleEntry;
use crate::scale::{self, GradeScale};

pub const POLICY_ENV: &str = "GRADE_POLICY";

/// Administrator-editable grading policy.
///
/// Example YAML:
/// ```yaml
/// scale_spec: "A:90-100=4.0;B:80-89=3.0;C:70-79=2.0;D:60-69=1.0;F:0-59=0"
/// weight_by_credits: true
/// include_transfer: false
/// passing_grade: D
/// late_penalty_percent_per_day: 5
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GradePolicy {
    /// Explicit scale entries, sorted descending by `min_score`.
    #[serde(default)]
    pub scale: Option<Vec<GradeScaleEntry>>,

    /// Compact `label:min-max[=points]` form, an alternative to `scale`.
    #[serde(default)]
    pub scale_spec: Option<String>,

    /// When false, letter grades are reported without `+`/`-`.
    #[serde(default = "default_true")]
    pub include_plus_minus: bool,

    #[serde(default = "default_true")]
    pub weight_by_credits: bool,

    #[serde(default)]
    pub include_transfer: bool,

    /// Lowest letter grade that earns credit on a transcript.
    #[serde(default)]
    pub passing_grade: Option<String>,

    #[serde(default)]
    pub late_penalty_percent_per_day: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl Default for GradePolicy {
    fn default() -> Self {
        Self {
            scale: None,
            scale_spec: None,
            include_plus_minus: true,
            weight_by_credits: true,
            include_transfer: false,
            passing_grade: Some("D".to_string()),
            late_penalty_percent_per_day: None,
        }
    }
}

impl GradePolicy {
    /// Scale entries as configured, falling back to the built-in scale.
    pub fn scale_entries(&self) -> Result<Vec<GradeScaleEntry>, GradeError> {
        match (&self.scale, &self.scale_spec) {
            (Some(entries), _) => Ok(entries.clone()),
            (None, Some(spec)) => scale::parse_scale_spec(spec),
            (None, None) => Ok(GradeScale::default().entries().to_vec()),
        }
    }

    pub fn grade_scale(&self) -> Result<GradeScale, GradeError> {
        GradeScale::new(self.scale_entries()?)
    }

    pub fn passing_grade(&self) -> &str {
        self.passing_grade.as_deref().unwrap_or("D")
    }

    pub fn gpa_options(&self, semester_filter: Option<String>) -> GpaOptions {
        GpaOptions {
            weight_by_credits: self.weight_by_credits,
            include_transfer: self.include_transfer,
            include_plus_minus: self.include_plus_minus,
            semester_filter,
        }
    }
}

/// Validate a policy before it is used or saved.
/// Returns all validation errors at once.
pub fn validate_policy(policy: &GradePolicy) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if policy.scale.is_some() && policy.scale_spec.is_some() {
        errors.push("policy: set either scale or scale_spec, not both".to_string());
    }

    match policy.scale_entries() {
        Ok(entries) => {
            if let Err(problems) = scale::validate_scale(&entries) {
                errors.extend(problems);
            } else {
                let passing = policy.passing_grade();
                if !entries.iter().any(|e| e.label.eq_ignore_ascii_case(passing)) {
                    errors.push(format!(
                        "policy.passing_grade: '{passing}' is not a label in the scale"
                    ));
                }
            }
        }
        Err(e) => errors.push(format!("policy.scale_spec: {e}")),
    }

    if let Some(percent) = policy.late_penalty_percent_per_day {
        if !(0.0..=100.0).contains(&percent) {
            errors.push(
                "policy.late_penalty_percent_per_day: must be between 0 and 100".to_string(),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Load the grading policy.
///
/// An explicit `path` must exist. Without one, the `GRADE_POLICY` environment
/// variable is consulted, and the built-in policy is used when that is unset.
pub fn load_policy(path: Option<PathBuf>) -> Result<GradePolicy> {
    let policy_path = match path.or_else(|| std::env::var_os(POLICY_ENV).map(PathBuf::from)) {
        Some(path) => path,
        None => {
            tracing::debug!("no policy file configured, using built-in policy");
            return Ok(GradePolicy::default());
        }
    };

    if !policy_path.exists() {
        anyhow::bail!("Policy file not found at {}", policy_path.display());
    }

    let content = fs::read_to_string(&policy_path)
        .with_context(|| format!("Failed to read policy file at {}", policy_path.display()))?;

    let policy: GradePolicy = serde_saphyr::from_str(&content)
        .with_context(|| format!("Failed to parse policy: invalid YAML in {}", policy_path.display()))?;

    tracing::debug!(path = %policy_path.display(), "loaded grade policy");
    Ok(policy)
}
