//! Streaming replica synchronisation
//!
//! Confirms that every streaming replica has replayed WAL up to a barrier
//! captured on the master at call time. The barrier comes from a forced
//! segment switch so that the wait makes progress even on an idle master.

use std::thread;
use std::time::{Duration, Instant};

use postgres::types::PgLsn;
use tracing::{debug, error, info, warn};

use crate::admin::{BackendSession, ConnectionAdministrator};
use crate::topology::Topology;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

/// Bounded-time poll for replica catch-up.
#[derive(Debug, Clone, Copy)]
pub struct SyncWaiter {
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for SyncWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_SYNC_TIMEOUT)
    }
}

impl SyncWaiter {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait until no replica reports a replay position behind a freshly
    /// captured barrier, or until `timeout` elapses.
    ///
    /// With no replicas the condition holds on the first check.
    pub fn streaming_sync(&self, master: &mut dyn BackendSession, timeout: Duration) -> bool {
        let barrier = match master.switch_wal() {
            Ok(lsn) => lsn,
            Err(e) => {
                error!(error = %e, "unable to capture WAL barrier");
                return false;
            }
        };
        self.wait_for_barrier(master, barrier, timeout)
    }

    /// Poll until no replica reports a replay position behind `barrier`.
    pub fn wait_for_barrier(
        &self,
        master: &mut dyn BackendSession,
        barrier: PgLsn,
        timeout: Duration,
    ) -> bool {
        debug!(barrier = %barrier, "waiting for replicas");

        let started = Instant::now();
        loop {
            match master.replicas_behind(barrier) {
                Ok(0) => return true,
                Ok(behind) => debug!(behind, "replicas still behind barrier"),
                Err(e) => {
                    error!(error = %e, "unable to read replica positions");
                    return false;
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return false;
            }
            thread::sleep(self.poll_interval.min(timeout - elapsed));
        }
    }

    /// Capture a barrier on the topology's master and wait with the
    /// configured timeout. On failure the slaves still behind are named.
    pub fn sync(&self, admin: &ConnectionAdministrator, topology: &Topology) -> bool {
        let barrier = match admin.capture_wal_position(&topology.master.dsn) {
            Ok(lsn) => lsn,
            Err(e) => {
                error!(error = %e, "unable to capture WAL barrier");
                return false;
            }
        };
        let mut master = match admin.connect(&topology.master.dsn) {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "unable to connect to master for sync");
                return false;
            }
        };

        let in_sync = self.wait_for_barrier(master.as_mut(), barrier, self.timeout);
        if in_sync {
            info!("slaves in sync");
            return true;
        }

        error!(
            timeout_secs = self.timeout.as_secs_f64(),
            "slaves failed to sync"
        );
        for slave in &topology.slaves {
            if !admin.replica_caught_up(slave, barrier) {
                warn!(pool = %slave.pool_name, barrier = %barrier, "slave behind barrier");
            }
        }
        false
    }
}
