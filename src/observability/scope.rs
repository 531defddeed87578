//! StepScope for automatic begin/complete logging
//!
//! - Logs `{NAME}_BEGIN` on creation
//! - Logs `{NAME}_COMPLETE` or `{NAME}_FAILED` when closed
//! - Logs `{NAME}_INCOMPLETE` on drop if never closed

use std::time::Instant;

use tracing::{error, info, warn};

/// # Usage
///
/// ```ignore
/// let scope = StepScope::new("UPGRADE");
/// // ... do work ...
/// scope.complete(); // logs UPGRADE_COMPLETE with elapsed_ms
/// ```
pub struct StepScope {
    name: String,
    started: Instant,
    closed: bool,
}

impl StepScope {
    pub fn new(name: &str) -> Self {
        let name = name.to_ascii_uppercase();
        info!(event = %format!("{}_BEGIN", name));
        Self {
            name,
            started: Instant::now(),
            closed: false,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    pub fn complete(mut self) {
        self.closed = true;
        info!(
            event = %format!("{}_COMPLETE", self.name),
            elapsed_ms = self.elapsed_ms() as u64
        );
    }

    pub fn fail(mut self, code: i32, reason: &str) {
        self.closed = true;
        error!(
            event = %format!("{}_FAILED", self.name),
            elapsed_ms = self.elapsed_ms() as u64,
            code,
            reason
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for StepScope {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                event = %format!("{}_INCOMPLETE", self.name),
                elapsed_ms = self.elapsed_ms() as u64,
                "scope dropped without completion"
            );
        }
    }
}
