//! `postgres`-backed implementations of the administration seams.

use std::time::Duration;

use postgres::types::PgLsn;
use postgres::{Client, NoTls, Row};
use tracing::debug;

use super::dsn::Dsn;
use super::errors::{AdminError, AdminResult};
use super::session::{BackendSession, ClientBackend, Connector, MasterTransaction};

const CLIENT_BACKENDS_QUERY: &str = "\
    SELECT pid, COALESCE(usename::text, ''), COALESCE(application_name, ''), \
           EXTRACT(EPOCH FROM (now() - xact_start))::float8 \
    FROM pg_stat_activity \
    WHERE datname = $1 \
      AND pid <> pg_backend_pid() \
      AND backend_type = 'client backend'";

/// Opens plain-TCP (or socket) connections with the synchronous client.
#[derive(Debug, Clone, Default)]
pub struct PgConnector {
    connect_timeout: Option<Duration>,
}

impl PgConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn client(&self, dsn: &Dsn) -> AdminResult<Client> {
        let mut config = dsn.to_config();
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout(timeout);
        }
        debug!(backend = %dsn.label(), "connecting");
        config
            .connect(NoTls)
            .map_err(|e| AdminError::connect(dsn.label(), e))
    }
}

impl Connector for PgConnector {
    fn connect(&self, dsn: &Dsn) -> AdminResult<Box<dyn BackendSession>> {
        let client = self.client(dsn)?;
        Ok(Box::new(PgSession {
            client,
            target: dsn.label(),
        }))
    }

    fn open_transaction(&self, dsn: &Dsn) -> AdminResult<Box<dyn MasterTransaction>> {
        let mut client = self.client(dsn)?;
        client
            .batch_execute("BEGIN")
            .map_err(|e| AdminError::command(dsn.label(), e))?;
        Ok(Box::new(PgMasterTransaction {
            client,
            target: dsn.label(),
            open: true,
        }))
    }
}

/// Autocommit session: every statement is its own transaction.
pub struct PgSession {
    client: Client,
    target: String,
}

impl PgSession {
    fn query_one(
        &mut self,
        sql: &str,
        params: &[&(dyn postgres::types::ToSql + Sync)],
    ) -> AdminResult<Row> {
        self.client
            .query_one(sql, params)
            .map_err(|e| AdminError::command(&self.target, e))
    }

    fn column<'a, T>(&self, row: &'a Row, idx: usize) -> AdminResult<T>
    where
        T: postgres::types::FromSql<'a>,
    {
        row.try_get(idx)
            .map_err(|e| AdminError::unexpected(&self.target, e))
    }
}

impl BackendSession for PgSession {
    fn is_in_recovery(&mut self) -> AdminResult<bool> {
        let row = self.query_one("SELECT pg_is_in_recovery()", &[])?;
        self.column(&row, 0)
    }

    fn is_replay_paused(&mut self) -> AdminResult<bool> {
        let row = self.query_one("SELECT pg_is_wal_replay_paused()", &[])?;
        self.column(&row, 0)
    }

    fn pause_replay(&mut self) -> AdminResult<()> {
        self.client
            .batch_execute("SELECT pg_wal_replay_pause()")
            .map_err(|e| AdminError::command(&self.target, e))
    }

    fn resume_replay(&mut self) -> AdminResult<()> {
        self.client
            .batch_execute("SELECT pg_wal_replay_resume()")
            .map_err(|e| AdminError::command(&self.target, e))
    }

    fn switch_wal(&mut self) -> AdminResult<PgLsn> {
        let row = self.query_one("SELECT pg_switch_wal()", &[])?;
        self.column(&row, 0)
    }

    fn last_replay_lsn(&mut self) -> AdminResult<Option<PgLsn>> {
        let row = self.query_one("SELECT pg_last_wal_replay_lsn()", &[])?;
        self.column(&row, 0)
    }

    fn replicas_behind(&mut self, barrier: PgLsn) -> AdminResult<u64> {
        let row = self.query_one(
            "SELECT count(*) FROM pg_stat_replication WHERE replay_lsn < $1",
            &[&barrier],
        )?;
        let count: i64 = self.column(&row, 0)?;
        Ok(count.max(0) as u64)
    }

    fn replay_lag(&mut self) -> AdminResult<Option<Duration>> {
        let row = self.query_one(
            "SELECT EXTRACT(EPOCH FROM (now() - pg_last_xact_replay_timestamp()))::float8",
            &[],
        )?;
        let seconds: Option<f64> = self.column(&row, 0)?;
        Ok(seconds.map(|s| Duration::from_secs_f64(s.max(0.0))))
    }

    fn is_superuser(&mut self) -> AdminResult<bool> {
        let row = self.query_one(
            "SELECT rolsuper FROM pg_roles WHERE rolname = current_user",
            &[],
        )?;
        self.column(&row, 0)
    }

    fn client_backends(&mut self, dbname: &str) -> AdminResult<Vec<ClientBackend>> {
        let rows = self
            .client
            .query(CLIENT_BACKENDS_QUERY, &[&dbname])
            .map_err(|e| AdminError::command(&self.target, e))?;

        let mut backends = Vec::with_capacity(rows.len());
        for row in &rows {
            let xact_seconds: Option<f64> = self.column(row, 3)?;
            backends.push(ClientBackend {
                pid: self.column(row, 0)?,
                usename: self.column(row, 1)?,
                application_name: self.column(row, 2)?,
                xact_age: xact_seconds.map(|s| Duration::from_secs_f64(s.max(0.0))),
            });
        }
        Ok(backends)
    }

    fn terminate_backend(&mut self, pid: i32) -> AdminResult<bool> {
        let row = self.query_one("SELECT pg_terminate_backend($1)", &[&pid])?;
        self.column(&row, 0)
    }
}

/// Explicit transaction on the master; `BEGIN` is issued on open.
pub struct PgMasterTransaction {
    client: Client,
    target: String,
    open: bool,
}

impl MasterTransaction for PgMasterTransaction {
    fn batch_execute(&mut self, sql: &str) -> AdminResult<()> {
        if !self.open {
            return Err(AdminError::TransactionClosed);
        }
        self.client
            .batch_execute(sql)
            .map_err(|e| AdminError::command(&self.target, e))
    }

    fn commit(&mut self) -> AdminResult<()> {
        if !self.open {
            return Err(AdminError::TransactionClosed);
        }
        self.open = false;
        self.client
            .batch_execute("COMMIT")
            .map_err(|e| AdminError::command(&self.target, e))
    }

    fn rollback(&mut self) -> AdminResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.client
            .batch_execute("ROLLBACK")
            .map_err(|e| AdminError::command(&self.target, e))
    }
}
