//! # Pool Errors

use thiserror::Error;

use crate::admin::AdminError;

/// Result type for pooling-proxy console operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors from the pooling proxy's admin console.
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    #[error("unable to connect to pool console: {0}")]
    Connect(String),

    #[error("console command '{command}' failed: {reason}")]
    Command { command: String, reason: String },

    #[error("invalid pool name: '{0}'")]
    InvalidPoolName(String),

    #[error("malformed console output: {0}")]
    MalformedOutput(String),
}

/// Errors that prevent a topology from being established.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("no master detected for database '{dbname}'")]
    NoMaster { dbname: String },

    #[error("multiple masters detected for database '{dbname}': {}", .pools.join(", "))]
    MultipleMasters { dbname: String, pools: Vec<String> },

    #[error(transparent)]
    Console(#[from] PoolError),

    #[error("unable to classify pool '{pool}': {source}")]
    Classification {
        pool: String,
        #[source]
        source: AdminError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_error_is_transparent() {
        let err = DiscoveryError::from(PoolError::Connect("refused".to_string()));
        assert_eq!(err.to_string(), "unable to connect to pool console: refused");
    }

    #[test]
    fn test_multiple_masters_lists_pools() {
        let err = DiscoveryError::MultipleMasters {
            dbname: "main".to_string(),
            pools: vec!["main_a".to_string(), "main_b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "multiple masters detected for database 'main': main_a, main_b"
        );
    }
}
