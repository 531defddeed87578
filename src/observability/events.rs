//! Lifecycle events of a full-update run
//!
//! Events are explicit and typed. Each has a stable upper-case name that
//! appears as the `event` field of the log line.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverEvent {
    // Discovery
    TopologyDiscovered,
    ReplicationRestored,

    // Outage window
    ReplicationPaused,
    OutageStart,
    MasterDisabled,
    MasterReenabled,
    OutageEnd,
    /// Master could not be re-enabled; clients are still locked out.
    OutageOngoing,

    // Slaves
    SlavesDisabled,
    ReplicationResumed,
    /// Replication must be resumed by hand.
    ReplicationResumeFailed,
    SlavesInSync,
    SlavesOutOfSync,
    SlavesReenabled,
    /// Slave pools stayed disabled; clients only reach the master.
    MasterOnlyMode,

    // Cleanup
    TransactionRolledBack,
    CleanupComplete,

    RunComplete,
    RunFailed,
}

impl FailoverEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverEvent::TopologyDiscovered => "TOPOLOGY_DISCOVERED",
            FailoverEvent::ReplicationRestored => "REPLICATION_RESTORED",
            FailoverEvent::ReplicationPaused => "REPLICATION_PAUSED",
            FailoverEvent::OutageStart => "OUTAGE_START",
            FailoverEvent::MasterDisabled => "MASTER_DISABLED",
            FailoverEvent::MasterReenabled => "MASTER_REENABLED",
            FailoverEvent::OutageEnd => "OUTAGE_END",
            FailoverEvent::OutageOngoing => "OUTAGE_ONGOING",
            FailoverEvent::SlavesDisabled => "SLAVES_DISABLED",
            FailoverEvent::ReplicationResumed => "REPLICATION_RESUMED",
            FailoverEvent::ReplicationResumeFailed => "REPLICATION_RESUME_FAILED",
            FailoverEvent::SlavesInSync => "SLAVES_IN_SYNC",
            FailoverEvent::SlavesOutOfSync => "SLAVES_OUT_OF_SYNC",
            FailoverEvent::SlavesReenabled => "SLAVES_REENABLED",
            FailoverEvent::MasterOnlyMode => "MASTER_ONLY_MODE",
            FailoverEvent::TransactionRolledBack => "TRANSACTION_ROLLED_BACK",
            FailoverEvent::CleanupComplete => "CLEANUP_COMPLETE",
            FailoverEvent::RunComplete => "RUN_COMPLETE",
            FailoverEvent::RunFailed => "RUN_FAILED",
        }
    }

    /// Events that need an operator's attention.
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            FailoverEvent::OutageOngoing
                | FailoverEvent::ReplicationResumeFailed
                | FailoverEvent::SlavesOutOfSync
                | FailoverEvent::RunFailed
        )
    }

    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            FailoverEvent::MasterOnlyMode | FailoverEvent::TransactionRolledBack
        )
    }
}

impl fmt::Display for FailoverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log a lifecycle event at the level it implies.
pub fn log_event(event: FailoverEvent, detail: &str) {
    if event.is_alert() {
        tracing::error!(event = event.as_str(), "{}", detail);
    } else if event.is_warning() {
        tracing::warn!(event = event.as_str(), "{}", detail);
    } else {
        tracing::info!(event = event.as_str(), "{}", detail);
    }
}
