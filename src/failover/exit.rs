//! Process exit statuses
//!
//! Each failure point has its own code so operators can tell them apart
//! without reading logs. Step failures carry the step's own code.

use std::fmt;

use crate::pool::DiscoveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// Configuration, console or discovery-time connection failure.
    SetupFailed,
    ReplicationPauseFailed,
    MasterConnectFailed,
    MasterDisableFailed,
    /// The master pool could not be re-enabled; the outage continues.
    MasterEnableFailed,
    MultipleMasters,
    NoMaster,
    PreflightFailed,
    KillPreflightFailed,
    FinalPreflightFailed,
    UpgradeFailed { code: i32 },
    SecurityFailed { code: i32 },
    /// The run reached a state the orchestrator does not allow.
    Internal,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::SetupFailed | ExitStatus::Internal => 1,
            ExitStatus::ReplicationPauseFailed => 93,
            ExitStatus::MasterConnectFailed => 94,
            ExitStatus::MasterDisableFailed => 95,
            ExitStatus::MasterEnableFailed => 96,
            ExitStatus::MultipleMasters => 97,
            ExitStatus::NoMaster => 98,
            ExitStatus::PreflightFailed => 99,
            ExitStatus::KillPreflightFailed => 100,
            ExitStatus::FinalPreflightFailed => 101,
            ExitStatus::UpgradeFailed { code } | ExitStatus::SecurityFailed { code } => *code,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExitStatus::Success => "success",
            ExitStatus::SetupFailed => "setup_failed",
            ExitStatus::ReplicationPauseFailed => "replication_pause_failed",
            ExitStatus::MasterConnectFailed => "master_connect_failed",
            ExitStatus::MasterDisableFailed => "master_disable_failed",
            ExitStatus::MasterEnableFailed => "master_enable_failed",
            ExitStatus::MultipleMasters => "multiple_masters",
            ExitStatus::NoMaster => "no_master",
            ExitStatus::PreflightFailed => "preflight_failed",
            ExitStatus::KillPreflightFailed => "kill_preflight_failed",
            ExitStatus::FinalPreflightFailed => "final_preflight_failed",
            ExitStatus::UpgradeFailed { .. } => "upgrade_failed",
            ExitStatus::SecurityFailed { .. } => "security_failed",
            ExitStatus::Internal => "internal_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }
}

impl From<&DiscoveryError> for ExitStatus {
    fn from(e: &DiscoveryError) -> Self {
        match e {
            DiscoveryError::NoMaster { .. } => ExitStatus::NoMaster,
            DiscoveryError::MultipleMasters { .. } => ExitStatus::MultipleMasters,
            DiscoveryError::Console(_) | DiscoveryError::Classification { .. } => {
                ExitStatus::SetupFailed
            }
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}
