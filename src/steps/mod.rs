//! Maintenance steps run inside the outage window
//!
//! The schema upgrade and the security reset share one transaction on the
//! master: the upgrade must never commit, the security reset commits on
//! success. Both report a structured [`StepOutcome`]; the orchestrator
//! propagates a failing code verbatim as the process exit code.

mod errors;
mod sql;

pub use errors::{StepError, StepResult};
pub use sql::{patch_files, SqlPatchUpgrade, SqlSecurityReset};

use uuid::Uuid;

use crate::admin::MasterTransaction;

/// Everything a step may touch, passed explicitly.
pub struct StepContext<'a> {
    pub run_id: Uuid,
    pub dbname: &'a str,
    /// Roll back instead of committing.
    pub dry_run: bool,
    pub master: &'a mut dyn MasterTransaction,
}

/// Result of running a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    code: i32,
    message: Option<String>,
}

impl StepOutcome {
    pub fn success() -> Self {
        Self {
            code: 0,
            message: None,
        }
    }

    /// A failure. The code becomes the process exit status, so anything
    /// outside 1..=255 (which the shell would see truncated, possibly to 0)
    /// is reported as 1.
    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: if (1..=255).contains(&code) { code } else { 1 },
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// An opaque unit of work against the master transaction.
pub trait MaintenanceStep {
    fn name(&self) -> &str;

    fn run(&self, ctx: &mut StepContext<'_>) -> StepResult<StepOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_outcome() {
        let outcome = StepOutcome::success();
        assert!(outcome.is_success());
        assert_eq!(outcome.code(), 0);
        assert_eq!(outcome.message(), None);
    }

    #[test]
    fn test_failure_keeps_code_and_message() {
        let outcome = StepOutcome::failure(3, "patch-2209-00-1.sql failed");
        assert!(!outcome.is_success());
        assert_eq!(outcome.code(), 3);
        assert_eq!(outcome.message(), Some("patch-2209-00-1.sql failed"));
    }

    #[test]
    fn test_failure_with_zero_code_is_not_success() {
        let outcome = StepOutcome::failure(0, "oops");
        assert!(!outcome.is_success());
        assert_eq!(outcome.code(), 1);
    }

    #[test]
    fn test_failure_code_out_of_exit_range() {
        assert_eq!(StepOutcome::failure(255, "oops").code(), 255);
        assert_eq!(StepOutcome::failure(256, "oops").code(), 1);
        assert_eq!(StepOutcome::failure(512, "oops").code(), 1);
        assert_eq!(StepOutcome::failure(-1, "oops").code(), 1);
    }
}
