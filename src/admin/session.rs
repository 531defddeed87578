//! Seams between the controller and the database cluster
//!
//! Everything the controller asks of a backend goes through
//! [`BackendSession`]; everything it asks of the master transaction goes
//! through [`MasterTransaction`]. [`Connector`] opens both.

use std::time::Duration;

use postgres::types::PgLsn;

use super::dsn::Dsn;
use super::errors::AdminResult;

/// A client connected to the logical database, as seen in
/// `pg_stat_activity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBackend {
    pub pid: i32,
    pub usename: String,
    pub application_name: String,
    /// Age of the currently open transaction, if any.
    pub xact_age: Option<Duration>,
}

/// An autocommit administrative session against one backend.
pub trait BackendSession {
    /// `pg_is_in_recovery()`.
    fn is_in_recovery(&mut self) -> AdminResult<bool>;

    /// `pg_is_wal_replay_paused()`.
    fn is_replay_paused(&mut self) -> AdminResult<bool>;

    /// `pg_wal_replay_pause()`.
    fn pause_replay(&mut self) -> AdminResult<()>;

    /// `pg_wal_replay_resume()`.
    fn resume_replay(&mut self) -> AdminResult<()>;

    /// Force a WAL segment switch and return the resulting position.
    fn switch_wal(&mut self) -> AdminResult<PgLsn>;

    /// Last WAL position replayed by this replica.
    fn last_replay_lsn(&mut self) -> AdminResult<Option<PgLsn>>;

    /// Number of streaming replicas whose replay position is strictly
    /// behind `barrier`.
    fn replicas_behind(&mut self, barrier: PgLsn) -> AdminResult<u64>;

    /// Time since the last replayed transaction, `None` on a master or a
    /// replica that has replayed nothing yet.
    fn replay_lag(&mut self) -> AdminResult<Option<Duration>>;

    fn is_superuser(&mut self) -> AdminResult<bool>;

    /// Client connections to `dbname`, excluding this session.
    fn client_backends(&mut self, dbname: &str) -> AdminResult<Vec<ClientBackend>>;

    /// `pg_terminate_backend(pid)`.
    fn terminate_backend(&mut self, pid: i32) -> AdminResult<bool>;
}

/// The single non-autocommit connection to the master shared by the
/// upgrade and security steps.
pub trait MasterTransaction {
    fn batch_execute(&mut self, sql: &str) -> AdminResult<()>;

    fn commit(&mut self) -> AdminResult<()>;

    /// Roll back. A no-op once the transaction has been committed.
    fn rollback(&mut self) -> AdminResult<()>;
}

/// Opens connections to backends.
pub trait Connector {
    fn connect(&self, dsn: &Dsn) -> AdminResult<Box<dyn BackendSession>>;

    fn open_transaction(&self, dsn: &Dsn) -> AdminResult<Box<dyn MasterTransaction>>;
}
