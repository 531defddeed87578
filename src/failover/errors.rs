//! # Failover Errors

use thiserror::Error;

use super::state::Phase;

/// Result type for run-state transitions
pub type RunStateResult<T> = Result<T, RunStateError>;

/// A transition the run-state machine does not allow. Reaching one is a
/// programming error in the orchestrator, never an operational failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunStateError {
    #[error("forbidden transition: {} -> {}", .from.name(), .to.name())]
    ForbiddenTransition { from: Phase, to: Phase },
}

impl RunStateError {
    pub fn forbidden_transition(from: Phase, to: Phase) -> Self {
        Self::ForbiddenTransition { from, to }
    }
}
