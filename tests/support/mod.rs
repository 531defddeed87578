//! In-memory cluster shared by the integration tests.
//!
//! One `Cluster` backs the pgbouncer console, every backend session and
//! the master transaction. Mutating calls are recorded in order.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use postgres::types::PgLsn;

use pgswitch::admin::{
    AdminError, AdminResult, BackendSession, ClientBackend, Connector, Dsn, MasterTransaction,
};
use pgswitch::failover::FailoverSettings;
use pgswitch::pool::{PoolCommand, PoolConsole, PoolEntry, PoolError, PoolResult};
use pgswitch::preflight::PreflightLimits;
use pgswitch::steps::{MaintenanceStep, StepContext, StepOutcome, StepResult};
use pgswitch::streaming::SyncWaiter;

pub const DBNAME: &str = "main";

#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    pub in_recovery: bool,
    pub replay_paused: bool,
    /// Replays nothing, ever.
    pub stuck: bool,
    pub unreachable: bool,
    pub fail_pause: bool,
    pub fail_resume: bool,
    pub refuse_transactions: bool,
    /// `None` means always superuser; `Some(n)` answers yes n more times.
    pub superuser_budget: Option<usize>,
    pub lag: Option<Duration>,
    pub clients: Vec<ClientBackend>,
    /// Pids that survive `pg_terminate_backend`.
    pub stubborn: BTreeSet<i32>,
}

#[derive(Debug, Default)]
pub struct ClusterState {
    pub pools: Vec<PoolEntry>,
    pub backends: BTreeMap<String, FakeBackend>,
    pub console_down: bool,
    /// Rendered console commands that fail, e.g. `"DISABLE main_master"`.
    pub failing_commands: BTreeSet<String>,
    pub disabled_pools: BTreeSet<String>,
    /// Every mutating call, in order.
    pub calls: Vec<String>,
    pub pending_sql: Vec<String>,
    pub committed_sql: Vec<String>,
    pub committed: bool,
    /// Barriers captured with `pg_switch_wal()`.
    pub wal_switches: usize,
}

#[derive(Clone, Default)]
pub struct Cluster {
    state: Rc<RefCell<ClusterState>>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// `main_master` on db1 and `main_slave` on db2.
    pub fn two_node() -> Self {
        Self::new()
            .with_master("main_master", "db1")
            .with_slave("main_slave", "db2")
    }

    pub fn with_master(self, pool: &str, host: &str) -> Self {
        self.with_backend(pool, host, false)
    }

    pub fn with_slave(self, pool: &str, host: &str) -> Self {
        self.with_backend(pool, host, true)
    }

    fn with_backend(self, pool: &str, host: &str, in_recovery: bool) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state
                .pools
                .push(PoolEntry::new(pool, Some(host), 5432, DBNAME));
            state.backends.insert(
                host.to_string(),
                FakeBackend {
                    in_recovery,
                    ..FakeBackend::default()
                },
            );
        }
        self
    }

    /// A pool entry for another database; discovery must skip it.
    pub fn with_foreign_pool(self, pool: &str, host: &str, database: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state
                .pools
                .push(PoolEntry::new(pool, Some(host), 5432, database));
            state.backends.entry(host.to_string()).or_default();
        }
        self
    }

    pub fn backend(&self, host: &str, f: impl FnOnce(&mut FakeBackend)) {
        let mut state = self.state.borrow_mut();
        f(state.backends.get_mut(host).expect("unknown host"));
    }

    pub fn fail_command(&self, command: &str) {
        self.state
            .borrow_mut()
            .failing_commands
            .insert(command.to_string());
    }

    pub fn state(&self) -> std::cell::Ref<'_, ClusterState> {
        self.state.borrow()
    }

    pub fn set_console_down(&self) {
        self.state.borrow_mut().console_down = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn has_call(&self, call: &str) -> bool {
        self.state.borrow().calls.iter().any(|c| c == call)
    }

    pub fn is_disabled(&self, pool: &str) -> bool {
        self.state.borrow().disabled_pools.contains(pool)
    }

    pub fn is_paused(&self, host: &str) -> bool {
        self.state.borrow().backends[host].replay_paused
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            state: Rc::clone(&self.state),
        }
    }

    pub fn console(&self) -> FakeConsole {
        FakeConsole {
            state: Rc::clone(&self.state),
        }
    }

    pub fn transaction(&self) -> FakeTransaction {
        FakeTransaction {
            state: Rc::clone(&self.state),
        }
    }
}

pub fn client(pid: i32, usename: &str) -> ClientBackend {
    ClientBackend {
        pid,
        usename: usename.to_string(),
        application_name: "psql".to_string(),
        xact_age: None,
    }
}

/// Settings with short waits so failing syncs do not slow the suite.
pub fn settings() -> FailoverSettings {
    FailoverSettings::new(DBNAME, "postgres")
        .with_sync(SyncWaiter::new(
            Duration::from_millis(1),
            Duration::from_millis(50),
        ))
        .with_limits(PreflightLimits {
            terminate_attempts: 3,
            terminate_interval: Duration::from_millis(1),
            ..PreflightLimits::default()
        })
}

// =============================================================================
// Connector / sessions
// =============================================================================

pub struct FakeConnector {
    state: Rc<RefCell<ClusterState>>,
}

fn host_of(dsn: &Dsn) -> String {
    dsn.host().unwrap_or("local").to_string()
}

impl Connector for FakeConnector {
    fn connect(&self, dsn: &Dsn) -> AdminResult<Box<dyn BackendSession>> {
        let host = host_of(dsn);
        let state = self.state.borrow();
        match state.backends.get(&host) {
            Some(b) if !b.unreachable => Ok(Box::new(FakeSession {
                state: Rc::clone(&self.state),
                host,
            })),
            _ => Err(AdminError::connect(host, "connection refused")),
        }
    }

    fn open_transaction(&self, dsn: &Dsn) -> AdminResult<Box<dyn MasterTransaction>> {
        let host = host_of(dsn);
        let state = self.state.borrow();
        match state.backends.get(&host) {
            Some(b) if !b.unreachable && !b.refuse_transactions => Ok(Box::new(FakeTransaction {
                state: Rc::clone(&self.state),
            })),
            _ => Err(AdminError::connect(host, "connection refused")),
        }
    }
}

pub struct FakeSession {
    state: Rc<RefCell<ClusterState>>,
    host: String,
}

impl FakeSession {
    fn with<T>(&self, f: impl FnOnce(&mut ClusterState, &str) -> T) -> T {
        let mut state = self.state.borrow_mut();
        f(&mut state, &self.host)
    }
}

impl BackendSession for FakeSession {
    fn is_in_recovery(&mut self) -> AdminResult<bool> {
        Ok(self.with(|s, h| s.backends[h].in_recovery))
    }

    fn is_replay_paused(&mut self) -> AdminResult<bool> {
        Ok(self.with(|s, h| s.backends[h].replay_paused))
    }

    fn pause_replay(&mut self) -> AdminResult<()> {
        self.with(|s, h| {
            s.calls.push(format!("pause {}", h));
            let backend = s.backends.get_mut(h).expect("known host");
            if backend.fail_pause {
                return Err(AdminError::command(h, "pause refused"));
            }
            backend.replay_paused = true;
            Ok(())
        })
    }

    fn resume_replay(&mut self) -> AdminResult<()> {
        self.with(|s, h| {
            s.calls.push(format!("resume {}", h));
            let backend = s.backends.get_mut(h).expect("known host");
            if backend.fail_resume {
                return Err(AdminError::command(h, "resume refused"));
            }
            backend.replay_paused = false;
            Ok(())
        })
    }

    fn switch_wal(&mut self) -> AdminResult<PgLsn> {
        self.with(|s, _| s.wal_switches += 1);
        Ok(PgLsn::from(0x1000_u64))
    }

    fn last_replay_lsn(&mut self) -> AdminResult<Option<PgLsn>> {
        Ok(self.with(|s, h| {
            let b = &s.backends[h];
            if b.stuck || b.replay_paused {
                Some(PgLsn::from(0x10_u64))
            } else {
                Some(PgLsn::from(0x1000_u64))
            }
        }))
    }

    fn replicas_behind(&mut self, _barrier: PgLsn) -> AdminResult<u64> {
        Ok(self.with(|s, _| {
            s.backends
                .values()
                .filter(|b| b.in_recovery && (b.stuck || b.replay_paused))
                .count() as u64
        }))
    }

    fn replay_lag(&mut self) -> AdminResult<Option<Duration>> {
        Ok(self.with(|s, h| s.backends[h].lag))
    }

    fn is_superuser(&mut self) -> AdminResult<bool> {
        Ok(self.with(|s, h| {
            let backend = s.backends.get_mut(h).expect("known host");
            match backend.superuser_budget.as_mut() {
                None => true,
                Some(0) => false,
                Some(n) => {
                    *n -= 1;
                    true
                }
            }
        }))
    }

    fn client_backends(&mut self, _dbname: &str) -> AdminResult<Vec<ClientBackend>> {
        Ok(self.with(|s, h| s.backends[h].clients.clone()))
    }

    fn terminate_backend(&mut self, pid: i32) -> AdminResult<bool> {
        Ok(self.with(|s, h| {
            s.calls.push(format!("terminate {} {}", h, pid));
            let backend = s.backends.get_mut(h).expect("known host");
            if backend.stubborn.contains(&pid) {
                return false;
            }
            let before = backend.clients.len();
            backend.clients.retain(|c| c.pid != pid);
            backend.clients.len() != before
        }))
    }
}

// =============================================================================
// Master transaction
// =============================================================================

pub struct FakeTransaction {
    state: Rc<RefCell<ClusterState>>,
}

impl MasterTransaction for FakeTransaction {
    fn batch_execute(&mut self, sql: &str) -> AdminResult<()> {
        let mut state = self.state.borrow_mut();
        if state.committed {
            return Err(AdminError::TransactionClosed);
        }
        if sql.contains("FAIL") {
            return Err(AdminError::command("db1", "syntax error"));
        }
        state.pending_sql.push(sql.to_string());
        Ok(())
    }

    fn commit(&mut self) -> AdminResult<()> {
        let mut state = self.state.borrow_mut();
        if state.committed {
            return Err(AdminError::TransactionClosed);
        }
        state.calls.push("COMMIT".to_string());
        let pending = std::mem::take(&mut state.pending_sql);
        state.committed_sql.extend(pending);
        state.committed = true;
        Ok(())
    }

    fn rollback(&mut self) -> AdminResult<()> {
        let mut state = self.state.borrow_mut();
        if state.committed {
            return Ok(());
        }
        state.calls.push("ROLLBACK".to_string());
        state.pending_sql.clear();
        Ok(())
    }
}

// =============================================================================
// Console
// =============================================================================

pub struct FakeConsole {
    state: Rc<RefCell<ClusterState>>,
}

impl PoolConsole for FakeConsole {
    fn show_databases(&mut self) -> PoolResult<Vec<PoolEntry>> {
        let state = self.state.borrow();
        if state.console_down {
            return Err(PoolError::Connect("console unreachable".to_string()));
        }
        Ok(state.pools.clone())
    }

    fn execute(&mut self, command: PoolCommand, pool: &str) -> PoolResult<()> {
        let text = command.render(pool)?;
        let mut state = self.state.borrow_mut();
        state.calls.push(text.clone());
        if state.failing_commands.contains(&text) {
            return Err(PoolError::Command {
                command: text,
                reason: "console refused".to_string(),
            });
        }
        match command {
            PoolCommand::Disable => {
                state.disabled_pools.insert(pool.to_string());
            }
            PoolCommand::Enable => {
                state.disabled_pools.remove(pool);
            }
            PoolCommand::Kill | PoolCommand::Resume => {}
        }
        Ok(())
    }
}

// =============================================================================
// Steps
// =============================================================================

/// Executes `sql`, optionally commits, then returns `code`.
pub struct ScriptedStep {
    pub name: &'static str,
    pub sql: Option<&'static str>,
    pub commit: bool,
    pub code: i32,
    pub error: bool,
}

impl ScriptedStep {
    pub fn upgrade(code: i32) -> Self {
        Self {
            name: "upgrade",
            sql: Some("ALTER TABLE account ADD COLUMN karma integer"),
            commit: false,
            code,
            error: false,
        }
    }

    pub fn security(code: i32) -> Self {
        Self {
            name: "security",
            sql: Some("GRANT SELECT ON account TO webapp"),
            commit: code == 0,
            code,
            error: false,
        }
    }

    pub fn erroring(name: &'static str) -> Self {
        Self {
            name,
            sql: None,
            commit: false,
            code: 0,
            error: true,
        }
    }
}

impl MaintenanceStep for ScriptedStep {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> StepResult<StepOutcome> {
        if self.error {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "script missing").into());
        }
        if let Some(sql) = self.sql {
            ctx.master.batch_execute(sql)?;
        }
        if self.code != 0 {
            return Ok(StepOutcome::failure(self.code, format!("{} failed", self.name)));
        }
        if self.commit && !ctx.dry_run {
            ctx.master.commit()?;
        }
        Ok(StepOutcome::success())
    }
}
