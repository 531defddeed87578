//! Connection Administrator
//!
//! Issues administrative commands against the master and its streaming
//! replicas. Connections are opened per call and dropped afterwards; no
//! transaction spans these calls.
//!
//! Aggregate operations (pause/resume across every slave) never return
//! errors. Each backend failure is logged and folded into the boolean
//! verdict so the caller decides how severe it is.

use postgres::types::PgLsn;
use tracing::{error, info, warn};

use super::dsn::Dsn;
use super::errors::AdminResult;
use super::session::{BackendSession, Connector, MasterTransaction};
use crate::policy::Aggregation;
use crate::topology::{join_names, Backend};

/// Outcome of forcing replication back on before a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplicationHealth {
    /// Every slave answered.
    pub healthy: bool,
    /// Slaves that had been left paused and were resumed.
    pub resumed: usize,
}

pub struct ConnectionAdministrator {
    connector: Box<dyn Connector>,
}

impl ConnectionAdministrator {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self { connector }
    }

    pub fn connect(&self, dsn: &Dsn) -> AdminResult<Box<dyn BackendSession>> {
        self.connector.connect(dsn)
    }

    pub fn open_transaction(&self, dsn: &Dsn) -> AdminResult<Box<dyn MasterTransaction>> {
        self.connector.open_transaction(dsn)
    }

    /// Whether `dsn` is a streaming replica. Read-only; connection errors
    /// propagate.
    pub fn is_in_recovery(&self, dsn: &Dsn) -> AdminResult<bool> {
        self.connect(dsn)?.is_in_recovery()
    }

    /// Pause WAL replay on every slave.
    ///
    /// Stops at the first failure: pausing must not silently leave a
    /// mixture of paused and replaying slaves.
    pub fn pause_replication(&self, slaves: &[Backend]) -> bool {
        let names: Vec<&str> = slaves.iter().map(|s| s.pool_name.as_str()).collect();
        info!(slaves = %join_names(&names), "pausing replication");

        Aggregation::AllOrAbort.apply(slaves, |slave| {
            match self.connect(&slave.dsn).and_then(|mut s| s.pause_replay()) {
                Ok(()) => true,
                Err(e) => {
                    error!(pool = %slave.pool_name, error = %e, "unable to pause replication");
                    false
                }
            }
        })
    }

    /// Resume WAL replay on every slave, attempting all of them.
    pub fn resume_replication(&self, slaves: &[Backend]) -> bool {
        let names: Vec<&str> = slaves.iter().map(|s| s.pool_name.as_str()).collect();
        info!(slaves = %join_names(&names), "resuming replication");

        Aggregation::BestEffortAll.apply(slaves, |slave| {
            match self.connect(&slave.dsn).and_then(|mut s| s.resume_replay()) {
                Ok(()) => true,
                Err(e) => {
                    error!(pool = %slave.pool_name, error = %e, "unable to resume replication");
                    false
                }
            }
        })
    }

    /// Resume replay on any slave left paused, e.g. by an earlier run that
    /// died before its cleanup.
    pub fn ensure_replication_enabled(&self, slaves: &[Backend]) -> ReplicationHealth {
        let mut resumed = 0;
        let healthy = Aggregation::BestEffortAll.apply(slaves, |slave| {
            let result = self.connect(&slave.dsn).and_then(|mut session| {
                if session.is_replay_paused()? {
                    warn!(pool = %slave.pool_name, "replication paused; resuming");
                    session.resume_replay()?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            });
            match result {
                Ok(was_paused) => {
                    if was_paused {
                        resumed += 1;
                    }
                    true
                }
                Err(e) => {
                    error!(pool = %slave.pool_name, error = %e, "failed to resume replication");
                    false
                }
            }
        });
        ReplicationHealth { healthy, resumed }
    }

    /// Force a WAL segment switch on the master and return the new
    /// position. An idle master would otherwise never move past it.
    pub fn capture_wal_position(&self, master: &Dsn) -> AdminResult<PgLsn> {
        self.connect(master)?.switch_wal()
    }

    /// Whether `slave` has replayed up to `barrier`.
    pub fn replica_caught_up(&self, slave: &Backend, barrier: PgLsn) -> bool {
        match self.connect(&slave.dsn).and_then(|mut s| s.last_replay_lsn()) {
            Ok(Some(replayed)) => replayed >= barrier,
            Ok(None) => false,
            Err(e) => {
                error!(pool = %slave.pool_name, error = %e, "unable to read replay position");
                false
            }
        }
    }
}
