//! # Step Errors

use thiserror::Error;

use crate::admin::AdminError;

/// Result type for maintenance steps
pub type StepResult<T> = Result<T, StepError>;

/// Errors a maintenance step raises instead of returning a code. The
/// orchestrator turns any of these into a failure with code 1.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Database(#[from] AdminError),
}

impl From<std::io::Error> for StepError {
    fn from(e: std::io::Error) -> Self {
        StepError::Io(e.to_string())
    }
}
