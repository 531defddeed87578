//! Preflight checks run before, during and after the outage window.

mod checker;

pub use checker::{ConnectionPolicy, DatabasePreflight, PreflightLimits};
