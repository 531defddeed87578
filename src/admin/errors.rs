//! # Administration Errors

use thiserror::Error;

/// Result type for administrative operations
pub type AdminResult<T> = Result<T, AdminError>;

/// Errors raised while talking to a PostgreSQL backend.
///
/// Aggregate operations never surface these; they log them per backend
/// and fold them into a boolean.
#[derive(Debug, Clone, Error)]
pub enum AdminError {
    #[error("unable to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("command failed on {target}: {reason}")]
    Command { target: String, reason: String },

    #[error("unexpected response from {target}: {reason}")]
    UnexpectedResponse { target: String, reason: String },

    #[error("transaction is no longer open")]
    TransactionClosed,
}

impl AdminError {
    pub fn connect(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn command(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Command {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unexpected(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::UnexpectedResponse {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the backend could not be reached at all.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}
