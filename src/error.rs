/// Errors raised by grade normalization and aggregation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GradeError {
    /// Bad input at the point of recording, surfaced to whoever submitted it.
    #[error("validation error: {0}")]
    Validation(String),
    /// The grade scale does not partition [0, 100]. Blocks saving the policy.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GradeError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, GradeError::Configuration(_))
    }
}
