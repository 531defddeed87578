//! Full-update orchestration
//!
//! A run is driven by [`FailoverOrchestrator`] over an explicit
//! [`FailoverRun`] state machine. Cleanup is derived from the run's
//! outstanding obligations, never from ad hoc flags.

mod errors;
mod exit;
mod orchestrator;
mod report;
mod settings;
mod state;

pub use errors::{RunStateError, RunStateResult};
pub use exit::ExitStatus;
pub use orchestrator::{full_update, preflight_only, FailoverOrchestrator};
pub use report::RunReport;
pub use settings::FailoverSettings;
pub use state::{CleanupPlan, FailoverRun, Obligations, Phase};
