use thiserror::Error;

/// A descriptor field was rejected before anything ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("Invalid spec field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl SpecError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SpecError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
