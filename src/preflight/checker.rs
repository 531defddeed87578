//! Database Preflight
//!
//! Confirms, as far as can be told from the outside, that an unattended
//! update will succeed: we are superuser, replicas are keeping up, and no
//! unexpected clients hold connections or long transactions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::admin::{AdminResult, ClientBackend, ConnectionAdministrator, Dsn};
use crate::streaming::SyncWaiter;
use crate::topology::Topology;

/// What to do about non-system clients connected to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPolicy {
    /// Any such client fails the check.
    #[default]
    Refuse,
    /// Report them and pass; they are about to be killed.
    Ignore,
    /// Terminate them, failing only if some refuse to go away.
    Terminate,
}

impl ConnectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionPolicy::Refuse => "refuse",
            ConnectionPolicy::Ignore => "ignore",
            ConnectionPolicy::Terminate => "terminate",
        }
    }
}

impl fmt::Display for ConnectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refuse" => Ok(ConnectionPolicy::Refuse),
            "ignore" => Ok(ConnectionPolicy::Ignore),
            "terminate" => Ok(ConnectionPolicy::Terminate),
            other => Err(format!(
                "unknown connection policy '{}' (expected refuse, ignore or terminate)",
                other
            )),
        }
    }
}

/// Thresholds applied by the checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreflightLimits {
    pub max_replication_lag: Duration,
    pub max_transaction_age: Duration,
    pub terminate_attempts: u32,
    pub terminate_interval: Duration,
}

impl Default for PreflightLimits {
    fn default() -> Self {
        Self {
            max_replication_lag: Duration::from_secs(60),
            max_transaction_age: Duration::from_secs(60),
            terminate_attempts: 100,
            terminate_interval: Duration::from_millis(100),
        }
    }
}

/// A non-system client and the backend it is connected to.
#[derive(Debug, Clone)]
struct Offender {
    pool: String,
    dsn: Dsn,
    client: ClientBackend,
}

impl fmt::Display for Offender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (pid {}, application '{}') on {}",
            self.client.usename, self.client.pid, self.client.application_name, self.pool
        )
    }
}

pub struct DatabasePreflight<'a> {
    admin: &'a ConnectionAdministrator,
    topology: &'a Topology,
    system_users: &'a BTreeSet<String>,
    sync: SyncWaiter,
    limits: PreflightLimits,
    policy: ConnectionPolicy,
    replication_paused: bool,
}

impl<'a> DatabasePreflight<'a> {
    pub fn new(
        admin: &'a ConnectionAdministrator,
        topology: &'a Topology,
        system_users: &'a BTreeSet<String>,
        sync: SyncWaiter,
        limits: PreflightLimits,
    ) -> Self {
        Self {
            admin,
            topology,
            system_users,
            sync,
            limits,
            policy: ConnectionPolicy::default(),
            replication_paused: false,
        }
    }

    pub fn with_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replication lag and sync checks are skipped while replay is paused.
    pub fn with_replication_paused(mut self, paused: bool) -> Self {
        self.replication_paused = paused;
        self
    }

    /// Run every check. Without superuser the rest would be meaningless,
    /// so that failure returns immediately; otherwise all checks run.
    pub fn check_all(&self) -> bool {
        info!(
            policy = %self.policy,
            replication_paused = self.replication_paused,
            "running preflight checks"
        );
        if !self.check_is_superuser() {
            return false;
        }

        let mut success = true;
        if !self.check_replication_lag() {
            success = false;
        }
        if !self.check_can_sync() {
            success = false;
        }
        // Connection checks last to keep the race window small.
        if !self.check_open_connections() {
            success = false;
        }
        if !self.check_long_running_transactions() {
            success = false;
        }

        if success {
            info!("preflight checks passed");
        } else {
            error!("preflight checks failed");
        }
        success
    }

    pub fn check_is_superuser(&self) -> bool {
        let master = &self.topology.master;
        match self.admin.connect(&master.dsn).and_then(|mut s| s.is_superuser()) {
            Ok(true) => true,
            Ok(false) => {
                error!(pool = %master.pool_name, "not running as a superuser");
                false
            }
            Err(e) => {
                error!(pool = %master.pool_name, error = %e, "unable to confirm superuser");
                false
            }
        }
    }

    pub fn check_replication_lag(&self) -> bool {
        if self.replication_paused {
            debug!("replication paused; skipping lag check");
            return true;
        }

        let mut success = true;
        for slave in &self.topology.slaves {
            match self.admin.connect(&slave.dsn).and_then(|mut s| s.replay_lag()) {
                Ok(Some(lag)) if lag > self.limits.max_replication_lag => {
                    error!(
                        pool = %slave.pool_name,
                        lag_secs = lag.as_secs_f64(),
                        max_secs = self.limits.max_replication_lag.as_secs_f64(),
                        "replication lag too high"
                    );
                    success = false;
                }
                Ok(lag) => {
                    debug!(
                        pool = %slave.pool_name,
                        lag_secs = lag.map(|l| l.as_secs_f64()),
                        "replication lag ok"
                    );
                }
                Err(e) => {
                    error!(
                        pool = %slave.pool_name,
                        error = %e,
                        "unable to determine replication lag"
                    );
                    success = false;
                }
            }
        }
        success
    }

    pub fn check_can_sync(&self) -> bool {
        if self.replication_paused {
            debug!("replication paused; skipping sync check");
            return true;
        }
        self.sync.sync(self.admin, self.topology)
    }

    pub fn check_open_connections(&self) -> bool {
        match self.policy {
            ConnectionPolicy::Ignore => {
                match self.offenders() {
                    Ok(offenders) => {
                        for offender in &offenders {
                            info!(client = %offender, "connected; will be killed");
                        }
                    }
                    Err(e) => warn!(error = %e, "unable to list connections"),
                }
                true
            }
            ConnectionPolicy::Refuse => match self.offenders() {
                Ok(offenders) if offenders.is_empty() => {
                    debug!("no unexpected connections");
                    true
                }
                Ok(offenders) => {
                    for offender in &offenders {
                        error!(client = %offender, "unexpected connection");
                    }
                    false
                }
                Err(e) => {
                    error!(error = %e, "unable to list connections");
                    false
                }
            },
            ConnectionPolicy::Terminate => self.terminate_connections(),
        }
    }

    pub fn check_long_running_transactions(&self) -> bool {
        let offenders = match self.offenders() {
            Ok(offenders) => offenders,
            Err(e) => {
                error!(error = %e, "unable to list transactions");
                return false;
            }
        };

        let mut success = true;
        for offender in &offenders {
            if let Some(age) = offender.client.xact_age {
                if age > self.limits.max_transaction_age {
                    error!(
                        client = %offender,
                        age_secs = age.as_secs_f64(),
                        "transaction open too long"
                    );
                    success = false;
                }
            }
        }
        success
    }

    fn terminate_connections(&self) -> bool {
        for attempt in 0..self.limits.terminate_attempts {
            let offenders = match self.offenders() {
                Ok(offenders) => offenders,
                Err(e) => {
                    error!(error = %e, "unable to list connections");
                    return false;
                }
            };
            if offenders.is_empty() {
                debug!(attempt, "no connections left to terminate");
                return true;
            }
            for offender in &offenders {
                warn!(client = %offender, "terminating connection");
                let result = self
                    .admin
                    .connect(&offender.dsn)
                    .and_then(|mut s| s.terminate_backend(offender.client.pid));
                if let Err(e) = result {
                    warn!(client = %offender, error = %e, "unable to terminate");
                }
            }
            thread::sleep(self.limits.terminate_interval);
        }

        match self.offenders() {
            Ok(offenders) if offenders.is_empty() => true,
            Ok(offenders) => {
                for offender in &offenders {
                    error!(client = %offender, "connection refused to die");
                }
                false
            }
            Err(e) => {
                error!(error = %e, "unable to list connections");
                false
            }
        }
    }

    /// Non-system clients on every backend of the topology.
    fn offenders(&self) -> AdminResult<Vec<Offender>> {
        let mut offenders = Vec::new();
        for backend in self.topology.backends() {
            let clients = self
                .admin
                .connect(&backend.dsn)?
                .client_backends(&self.topology.dbname)?;
            offenders.extend(
                clients
                    .into_iter()
                    .filter(|c| !self.system_users.contains(&c.usename))
                    .map(|client| Offender {
                        pool: backend.pool_name.clone(),
                        dsn: backend.dsn.clone(),
                        client,
                    }),
            );
        }
        Ok(offenders)
    }
}
