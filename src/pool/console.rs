//! pgbouncer admin console
//!
//! The console only understands the simple query protocol and a small
//! command language. Pool names are interpolated into commands verbatim,
//! so they are validated first.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use postgres::{Client, NoTls, SimpleQueryMessage, SimpleQueryRow};
use regex::Regex;
use tracing::debug;

use super::errors::{PoolError, PoolResult};

/// One row of `SHOW DATABASES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    /// Pool name as clients see it.
    pub name: String,
    /// Backend host; `None` means the local socket.
    pub host: Option<String>,
    pub port: u16,
    /// Database name on the backend.
    pub database: String,
}

impl PoolEntry {
    pub fn new(name: &str, host: Option<&str>, port: u16, database: &str) -> Self {
        Self {
            name: name.to_string(),
            host: host.map(str::to_string),
            port,
            database: database.to_string(),
        }
    }
}

/// Administrative commands issued per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolCommand {
    /// Reject new client connections.
    Disable,
    /// Drop every client and server connection; new clients queue until
    /// resumed.
    Kill,
    /// Release queued clients.
    Resume,
    /// Accept new client connections.
    Enable,
}

impl PoolCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolCommand::Disable => "DISABLE",
            PoolCommand::Kill => "KILL",
            PoolCommand::Resume => "RESUME",
            PoolCommand::Enable => "ENABLE",
        }
    }

    /// Render the console command for `pool`.
    pub fn render(&self, pool: &str) -> PoolResult<String> {
        validate_pool_name(pool)?;
        Ok(format!("{} {}", self.as_str(), pool))
    }
}

impl fmt::Display for PoolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn pool_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("static pattern"))
}

pub fn validate_pool_name(pool: &str) -> PoolResult<()> {
    if pool_name_pattern().is_match(pool) {
        Ok(())
    } else {
        Err(PoolError::InvalidPoolName(pool.to_string()))
    }
}

/// The pooling proxy's administrative interface.
pub trait PoolConsole {
    fn show_databases(&mut self) -> PoolResult<Vec<PoolEntry>>;

    fn execute(&mut self, command: PoolCommand, pool: &str) -> PoolResult<()>;
}

/// Console connection to a running pgbouncer.
pub struct PgBouncerConsole {
    client: Client,
}

impl PgBouncerConsole {
    /// Connect using a keyword/value connection string, e.g.
    /// `host=localhost port=6432 user=pgbouncer dbname=pgbouncer`.
    pub fn connect(conn_str: &str) -> PoolResult<Self> {
        let config =
            postgres::Config::from_str(conn_str).map_err(|e| PoolError::Connect(e.to_string()))?;
        let client = config
            .connect(NoTls)
            .map_err(|e| PoolError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

impl PoolConsole for PgBouncerConsole {
    fn show_databases(&mut self) -> PoolResult<Vec<PoolEntry>> {
        let messages = self
            .client
            .simple_query("SHOW DATABASES")
            .map_err(|e| PoolError::Command {
                command: "SHOW DATABASES".to_string(),
                reason: e.to_string(),
            })?;

        let mut entries = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                entries.push(parse_database_row(&row)?);
            }
        }
        Ok(entries)
    }

    fn execute(&mut self, command: PoolCommand, pool: &str) -> PoolResult<()> {
        let text = command.render(pool)?;
        debug!(command = %text, "pool console");
        self.client
            .batch_execute(&text)
            .map_err(|e| PoolError::Command {
                command: text,
                reason: e.to_string(),
            })
    }
}

fn text_column<'a>(row: &'a SimpleQueryRow, column: &str) -> PoolResult<Option<&'a str>> {
    row.try_get(column)
        .map_err(|e| PoolError::MalformedOutput(format!("column '{}': {}", column, e)))
}

fn parse_database_row(row: &SimpleQueryRow) -> PoolResult<PoolEntry> {
    let name = text_column(row, "name")?
        .ok_or_else(|| PoolError::MalformedOutput("pool without a name".to_string()))?;
    let host = text_column(row, "host")?.filter(|h| !h.is_empty());
    let port = text_column(row, "port")?
        .ok_or_else(|| PoolError::MalformedOutput(format!("pool '{}' has no port", name)))?;
    let port = parse_port(name, port)?;
    let database = text_column(row, "database")?.unwrap_or_default();

    Ok(PoolEntry::new(name, host, port, database))
}

fn parse_port(pool: &str, port: &str) -> PoolResult<u16> {
    port.trim().parse().map_err(|_| {
        PoolError::MalformedOutput(format!("pool '{}' has invalid port '{}'", pool, port))
    })
}
