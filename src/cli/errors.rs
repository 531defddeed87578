//! CLI-specific error types
//!
//! Every CLI error ends the process with exit code 1. Run failures are not
//! errors here: they come back as an exit status.

use std::io;

use thiserror::Error;

use crate::pool::PoolError;

#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file or flag error
    #[error("PGSWITCH_CONFIG_ERROR: {0}")]
    Config(String),

    /// I/O error (config file, stdout)
    #[error("PGSWITCH_IO_ERROR: {0}")]
    Io(String),

    /// The pgbouncer console could not be reached
    #[error("PGSWITCH_CONSOLE_ERROR: {0}")]
    Console(#[from] PoolError),
}

impl CliError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "PGSWITCH_CONFIG_ERROR",
            Self::Io(_) => "PGSWITCH_IO_ERROR",
            Self::Console(_) => "PGSWITCH_CONSOLE_ERROR",
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(format!("JSON error: {}", e))
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::config_error("dbname is required");
        assert_eq!(err.code(), "PGSWITCH_CONFIG_ERROR");
        assert_eq!(err.to_string(), "PGSWITCH_CONFIG_ERROR: dbname is required");
    }

    #[test]
    fn test_from_io() {
        let err: CliError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(&err, CliError::Io(msg) if msg == "gone"));
        assert_eq!(err.code(), "PGSWITCH_IO_ERROR");
    }

    #[test]
    fn test_console_failure_keeps_pool_error() {
        let err: CliError = PoolError::Connect("connection refused".to_string()).into();
        assert_eq!(err.code(), "PGSWITCH_CONSOLE_ERROR");
        assert!(err.to_string().starts_with("PGSWITCH_CONSOLE_ERROR: "));
        assert!(err.to_string().contains("connection refused"));
    }
}
