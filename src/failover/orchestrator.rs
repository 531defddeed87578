//! Failover Orchestrator
//!
//! Drives one full update: pause replication, take the master out of the
//! pool, apply schema and security changes in one transaction, then bring
//! everything back. Whatever happens, the cleanup phase undoes every
//! obligation still recorded on the run.
//!
//! Fatal failures before the security step abort with a distinct exit
//! status. Failures after it degrade the run but never undo the committed
//! work.

use chrono::Utc;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use super::errors::RunStateResult;
use super::exit::ExitStatus;
use super::report::RunReport;
use super::settings::FailoverSettings;
use super::state::{CleanupPlan, FailoverRun};
use crate::admin::{ConnectionAdministrator, Connector, MasterTransaction};
use crate::observability::{log_event, FailoverEvent, StepScope};
use crate::pool::{PoolConsole, PoolController};
use crate::preflight::{ConnectionPolicy, DatabasePreflight};
use crate::steps::{MaintenanceStep, StepContext, StepOutcome};

const MANUAL_RESUME: &str =
    "failed to resume replication; run SELECT pg_wal_replay_resume() on every slave";

pub struct FailoverOrchestrator {
    run_id: Uuid,
    admin: ConnectionAdministrator,
    pools: PoolController,
    settings: FailoverSettings,
    upgrade: Box<dyn MaintenanceStep>,
    security: Box<dyn MaintenanceStep>,
    run: FailoverRun,
    sync_achieved: Option<bool>,
    degradations: Vec<String>,
}

impl FailoverOrchestrator {
    pub fn new(
        run_id: Uuid,
        admin: ConnectionAdministrator,
        pools: PoolController,
        settings: FailoverSettings,
        upgrade: Box<dyn MaintenanceStep>,
        security: Box<dyn MaintenanceStep>,
    ) -> Self {
        Self {
            run_id,
            admin,
            pools,
            settings,
            upgrade,
            security,
            run: FailoverRun::new(),
            sync_achieved: None,
            degradations: Vec::new(),
        }
    }

    pub fn state(&self) -> &FailoverRun {
        &self.run
    }

    pub fn degradations(&self) -> &[String] {
        &self.degradations
    }

    /// Execute the run, clean up, and report.
    pub fn run(mut self, master: &mut dyn MasterTransaction) -> RunReport {
        let status = match self.execute(master) {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "run aborted");
                if !self.run.phase().is_terminal() {
                    // Only Done refuses fail(), and Done is terminal.
                    let _ = self.run.fail();
                }
                ExitStatus::Internal
            }
        };

        let plan = self.run.obligations().cleanup_plan();
        self.cleanup(plan, master);

        if status.is_success() {
            log_event(FailoverEvent::RunComplete, "full update complete");
        } else {
            log_event(FailoverEvent::RunFailed, &format!("full update failed: {}", status));
        }

        RunReport::from_run(
            self.run_id,
            self.pools.topology(),
            &self.run,
            status,
            self.sync_achieved,
            self.degradations,
        )
    }

    fn execute(&mut self, master: &mut dyn MasterTransaction) -> RunStateResult<ExitStatus> {
        self.restore_replication();

        // Connections that are about to be killed do not block the run.
        if !self.preflight(ConnectionPolicy::Ignore, false) {
            self.run.fail()?;
            return Ok(ExitStatus::PreflightFailed);
        }
        self.run.preflight_passed()?;

        // Slaves must not replay a half-applied upgrade.
        let slaves = self.pools.topology().slaves.clone();
        let paused = self.admin.pause_replication(&slaves);
        self.run.replication_pause(paused)?;
        if !paused {
            return Ok(ExitStatus::ReplicationPauseFailed);
        }
        log_event(FailoverEvent::ReplicationPaused, "replication paused");

        self.run.outage_started(Utc::now())?;
        log_event(FailoverEvent::OutageStart, "outage started");

        let disabled = self.pools.disable_master();
        self.run.master_disable(disabled)?;
        if !disabled {
            return Ok(ExitStatus::MasterDisableFailed);
        }
        log_event(FailoverEvent::MasterDisabled, "master pool disabled");

        // Anything still connected now is new; kill it.
        if !self.preflight(ConnectionPolicy::Terminate, true) {
            self.run.fail()?;
            return Ok(ExitStatus::KillPreflightFailed);
        }

        let outcome = self.run_step(StepKind::Upgrade, master);
        if !outcome.is_success() {
            self.run.fail()?;
            return Ok(ExitStatus::UpgradeFailed {
                code: outcome.code(),
            });
        }
        self.run.upgrade_applied()?;

        let outcome = self.run_step(StepKind::Security, master);
        if !outcome.is_success() {
            self.run.fail()?;
            return Ok(ExitStatus::SecurityFailed {
                code: outcome.code(),
            });
        }
        self.run.security_applied()?;

        // From here on the changes are committed; failures only degrade.
        let master_enabled = self.pools.enable_master();
        let now = Utc::now();
        self.run.master_enable(master_enabled, now)?;
        if master_enabled {
            log_event(FailoverEvent::MasterReenabled, "master pool re-enabled");
            self.log_outage_end();
        } else {
            log_event(FailoverEvent::OutageOngoing, "unable to re-enable master; outage ongoing");
            self.degrade("master pool could not be re-enabled");
        }

        let slaves_disabled = self.pools.disable_slaves();
        self.run.slaves_disable()?;
        if slaves_disabled {
            log_event(FailoverEvent::SlavesDisabled, "slave pools disabled");
        } else {
            self.degrade("slave pools could not all be disabled");
        }

        let resumed = self.admin.resume_replication(&slaves);
        self.run.replication_resume(resumed)?;
        if resumed {
            log_event(FailoverEvent::ReplicationResumed, "replication resumed");
            let in_sync = self.settings.sync.sync(&self.admin, self.pools.topology());
            self.sync_achieved = Some(in_sync);
            if in_sync {
                log_event(FailoverEvent::SlavesInSync, "slaves in sync");
            } else {
                log_event(FailoverEvent::SlavesOutOfSync, "slaves did not sync in time");
                self.degrade("slaves did not sync before the timeout");
            }
        } else {
            log_event(FailoverEvent::ReplicationResumeFailed, MANUAL_RESUME);
            self.degrade("replication could not be resumed");
        }

        let slaves_enabled = self.pools.enable_slaves();
        self.run.slaves_enable(slaves_enabled)?;
        if slaves_enabled {
            log_event(FailoverEvent::SlavesReenabled, "slave pools re-enabled");
        } else {
            log_event(
                FailoverEvent::MasterOnlyMode,
                "slave pools not re-enabled; running in master-only mode",
            );
            self.degrade("slave pools could not all be re-enabled");
        }

        if !master_enabled {
            self.run.fail()?;
            return Ok(ExitStatus::MasterEnableFailed);
        }

        // Clients are back, so their connections are expected.
        let still_paused = self.run.obligations().replication_paused;
        if !self.preflight(ConnectionPolicy::Ignore, still_paused) {
            self.run.fail()?;
            return Ok(ExitStatus::FinalPreflightFailed);
        }

        self.run.finish()?;
        Ok(ExitStatus::Success)
    }

    /// Perform exactly the undo actions in `plan`, recording each success
    /// on the run.
    pub fn cleanup(&mut self, plan: CleanupPlan, master: &mut dyn MasterTransaction) {
        if plan.is_empty() {
            return;
        }
        info!(?plan, "cleaning up");

        if plan.rollback_master {
            match master.rollback() {
                Ok(()) => {
                    self.run.rolled_back();
                    log_event(
                        FailoverEvent::TransactionRolledBack,
                        "master transaction rolled back",
                    );
                }
                Err(e) => error!(error = %e, "unable to roll back master transaction"),
            }
        }

        if plan.reenable_master {
            if self.pools.enable_master() {
                self.run.master_recovered(Utc::now());
                warn!("master re-enabled despite earlier failures");
                self.log_outage_end();
            } else {
                log_event(
                    FailoverEvent::OutageOngoing,
                    "master is still disabled in the pool; outage ongoing",
                );
            }
        }

        if plan.resume_replication {
            let slaves = self.pools.topology().slaves.clone();
            if self.admin.resume_replication(&slaves) {
                self.run.replication_recovered();
                log_event(FailoverEvent::ReplicationResumed, "replication resumed during cleanup");
            } else {
                log_event(FailoverEvent::ReplicationResumeFailed, MANUAL_RESUME);
            }
        }

        if plan.reenable_slaves {
            if self.pools.enable_slaves() {
                self.run.slaves_recovered();
                log_event(FailoverEvent::SlavesReenabled, "slave pools re-enabled during cleanup");
            } else {
                log_event(
                    FailoverEvent::MasterOnlyMode,
                    "slave pools not re-enabled; running in master-only mode",
                );
            }
        }

        log_event(FailoverEvent::CleanupComplete, "cleanup complete");
    }

    /// Resume any slave left paused by an earlier run, and wait for it to
    /// catch up. Failures are logged only.
    fn restore_replication(&mut self) {
        let health = self
            .admin
            .ensure_replication_enabled(&self.pools.topology().slaves);
        if !health.healthy {
            self.degrade("replication state of some slaves unknown before the run");
        }
        if health.resumed > 0 {
            log_event(
                FailoverEvent::ReplicationRestored,
                &format!("resumed replication on {} slave(s)", health.resumed),
            );
            self.settings.sync.sync(&self.admin, self.pools.topology());
        }
    }

    fn preflight(&self, policy: ConnectionPolicy, replication_paused: bool) -> bool {
        DatabasePreflight::new(
            &self.admin,
            self.pools.topology(),
            &self.settings.system_users,
            self.settings.sync,
            self.settings.limits,
        )
        .with_policy(policy)
        .with_replication_paused(replication_paused)
        .check_all()
    }

    /// Run a step, converting errors into a failing outcome.
    fn run_step(&self, kind: StepKind, master: &mut dyn MasterTransaction) -> StepOutcome {
        let step = match kind {
            StepKind::Upgrade => self.upgrade.as_ref(),
            StepKind::Security => self.security.as_ref(),
        };
        let scope = StepScope::new(step.name());
        let mut ctx = StepContext {
            run_id: self.run_id,
            dbname: &self.settings.dbname,
            dry_run: self.settings.dry_run,
            master,
        };
        let outcome = match step.run(&mut ctx) {
            Ok(outcome) => outcome,
            Err(e) => StepOutcome::failure(1, e.to_string()),
        };
        if outcome.is_success() {
            scope.complete();
        } else {
            scope.fail(outcome.code(), outcome.message().unwrap_or("no message"));
        }
        outcome
    }

    fn log_outage_end(&self) {
        let seconds = self
            .run
            .outage_duration(Utc::now())
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .unwrap_or_default();
        info!(
            event = FailoverEvent::OutageEnd.as_str(),
            outage_seconds = seconds,
            "outage over"
        );
    }

    fn degrade(&mut self, what: &str) {
        self.degradations.push(what.to_string());
    }
}

#[derive(Debug, Clone, Copy)]
enum StepKind {
    Upgrade,
    Security,
}

/// Discover the topology, open the master transaction and run a full
/// update. Setup failures are reported without any mutation.
pub fn full_update(
    settings: FailoverSettings,
    connector: Box<dyn Connector>,
    console: Box<dyn PoolConsole>,
    upgrade: Box<dyn MaintenanceStep>,
    security: Box<dyn MaintenanceStep>,
) -> RunReport {
    let run_id = Uuid::new_v4();
    let span = info_span!("full_update", run_id = %run_id, dbname = %settings.dbname);
    let _guard = span.enter();

    let admin = ConnectionAdministrator::new(connector);
    let pools = match PoolController::discover(console, &admin, &settings.dbname, &settings.dbuser)
    {
        Ok(pools) => pools,
        Err(e) => {
            error!(error = %e, "topology discovery failed");
            return RunReport::setup_failure(run_id, &settings.dbname, ExitStatus::from(&e));
        }
    };
    log_event(FailoverEvent::TopologyDiscovered, "topology discovered");

    let mut master = match admin.open_transaction(&pools.topology().master.dsn) {
        Ok(master) => master,
        Err(e) => {
            error!(pool = %pools.master_name(), error = %e, "unable to open master connection");
            return RunReport::setup_failure(
                run_id,
                &settings.dbname,
                ExitStatus::MasterConnectFailed,
            )
            .with_topology(pools.topology());
        }
    };

    FailoverOrchestrator::new(run_id, admin, pools, settings, upgrade, security)
        .run(master.as_mut())
}

/// Discover the topology and run the preflight checks only.
pub fn preflight_only(
    settings: &FailoverSettings,
    connector: Box<dyn Connector>,
    console: Box<dyn PoolConsole>,
    policy: ConnectionPolicy,
) -> ExitStatus {
    let admin = ConnectionAdministrator::new(connector);
    let pools = match PoolController::discover(console, &admin, &settings.dbname, &settings.dbuser)
    {
        Ok(pools) => pools,
        Err(e) => {
            error!(error = %e, "topology discovery failed");
            return ExitStatus::from(&e);
        }
    };

    let passed = DatabasePreflight::new(
        &admin,
        pools.topology(),
        &settings.system_users,
        settings.sync,
        settings.limits,
    )
    .with_policy(policy)
    .check_all();

    if passed {
        ExitStatus::Success
    } else {
        ExitStatus::PreflightFailed
    }
}
