//! Configuration file and flag resolution
//!
//! The JSON file is optional; every field in it is optional too. Flags
//! given on the command line win over the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::args::Cli;
use super::errors::{CliError, CliResult};
use crate::failover::FailoverSettings;
use crate::preflight::PreflightLimits;
use crate::streaming::SyncWaiter;

pub const DEFAULT_PGBOUNCER: &str = "host=localhost port=6432 user=pgbouncer dbname=pgbouncer";
pub const DEFAULT_DBUSER: &str = "postgres";

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub pgbouncer: Option<String>,

    #[serde(default)]
    pub dbname: Option<String>,

    #[serde(default)]
    pub dbuser: Option<String>,

    /// Users whose connections are left alone (dbuser is always added)
    #[serde(default = "default_system_users")]
    pub system_users: Vec<String>,

    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,

    #[serde(default = "default_sync_poll_interval_ms")]
    pub sync_poll_interval_ms: u64,

    #[serde(default = "default_max_replication_lag_secs")]
    pub max_replication_lag_secs: u64,

    #[serde(default = "default_max_transaction_age_secs")]
    pub max_transaction_age_secs: u64,

    #[serde(default = "default_terminate_attempts")]
    pub terminate_attempts: u32,

    #[serde(default = "default_terminate_interval_ms")]
    pub terminate_interval_ms: u64,

    /// Backend connect timeout; the driver default applies when unset
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,

    #[serde(default)]
    pub upgrade_dir: Option<PathBuf>,

    #[serde(default)]
    pub security_sql: Option<PathBuf>,

    #[serde(default)]
    pub dry_run: bool,
}

fn default_system_users() -> Vec<String> {
    vec!["postgres".to_string()]
}
fn default_sync_timeout_secs() -> u64 {
    60
}
fn default_sync_poll_interval_ms() -> u64 {
    200
}
fn default_max_replication_lag_secs() -> u64 {
    60
}
fn default_max_transaction_age_secs() -> u64 {
    60
}
fn default_terminate_attempts() -> u32 {
    100
}
fn default_terminate_interval_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pgbouncer: None,
            dbname: None,
            dbuser: None,
            system_users: default_system_users(),
            sync_timeout_secs: default_sync_timeout_secs(),
            sync_poll_interval_ms: default_sync_poll_interval_ms(),
            max_replication_lag_secs: default_max_replication_lag_secs(),
            max_transaction_age_secs: default_max_transaction_age_secs(),
            terminate_attempts: default_terminate_attempts(),
            terminate_interval_ms: default_terminate_interval_ms(),
            connect_timeout_secs: None,
            upgrade_dir: None,
            security_sql: None,
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> CliResult<()> {
        let positive = [
            ("sync_timeout_secs", self.sync_timeout_secs),
            ("sync_poll_interval_ms", self.sync_poll_interval_ms),
            ("terminate_interval_ms", self.terminate_interval_ms),
            ("terminate_attempts", u64::from(self.terminate_attempts)),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(CliError::config_error(format!("{} must be > 0", name)));
            }
        }

        if self.connect_timeout_secs == Some(0) {
            return Err(CliError::config_error("connect_timeout_secs must be > 0"));
        }

        if let Some(dbname) = &self.dbname {
            if dbname.trim().is_empty() {
                return Err(CliError::config_error("dbname must not be empty"));
            }
        }

        Ok(())
    }
}

/// Everything a command needs, after merging file and flags.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub pgbouncer: String,
    pub settings: FailoverSettings,
    pub connect_timeout: Option<Duration>,
    pub upgrade_dir: Option<PathBuf>,
    pub security_sql: Option<PathBuf>,
}

/// Flags specific to `run`.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub upgrade_dir: Option<PathBuf>,
    pub security_sql: Option<PathBuf>,
    pub dry_run: bool,
}

/// Load the config file named by `--config`, if any.
pub fn load_config(cli: &Cli) -> CliResult<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

pub fn resolve(cli: &Cli, config: Config, run: RunFlags) -> CliResult<Resolved> {
    let dbname = cli
        .dbname
        .clone()
        .or(config.dbname)
        .ok_or_else(|| CliError::config_error("--dbname is required"))?;
    if dbname.trim().is_empty() {
        return Err(CliError::config_error("--dbname must not be empty"));
    }

    let dbuser = cli
        .dbuser
        .clone()
        .or(config.dbuser)
        .unwrap_or_else(|| DEFAULT_DBUSER.to_string());
    let pgbouncer = cli
        .pgbouncer
        .clone()
        .or(config.pgbouncer)
        .unwrap_or_else(|| DEFAULT_PGBOUNCER.to_string());

    let limits = PreflightLimits {
        max_replication_lag: Duration::from_secs(config.max_replication_lag_secs),
        max_transaction_age: Duration::from_secs(config.max_transaction_age_secs),
        terminate_attempts: config.terminate_attempts,
        terminate_interval: Duration::from_millis(config.terminate_interval_ms),
    };
    let sync = SyncWaiter::new(
        Duration::from_millis(config.sync_poll_interval_ms),
        Duration::from_secs(config.sync_timeout_secs),
    );

    let settings = FailoverSettings::new(dbname, dbuser)
        .with_system_users(config.system_users)
        .with_limits(limits)
        .with_sync(sync)
        .with_dry_run(run.dry_run || config.dry_run);

    Ok(Resolved {
        pgbouncer,
        settings,
        connect_timeout: config.connect_timeout_secs.map(Duration::from_secs),
        upgrade_dir: run.upgrade_dir.or(config.upgrade_dir),
        security_sql: run.security_sql.or(config.security_sql),
    })
}
