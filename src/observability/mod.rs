//! Observability for full-update runs
//!
//! - Structured logging via `tracing`, installed once by the binary
//! - Named lifecycle events
//! - Scope-based begin/complete logging for maintenance steps

mod events;
mod logger;
mod scope;

pub use events::{log_event, FailoverEvent};
pub use logger::{init_logging, level_for, LogFormat};
pub use scope::StepScope;
