//! CLI command implementations
//!
//! Each command returns the process exit code. Errors surfaced as
//! `CliError` exit with 1.

use tracing::error;

use super::args::{Cli, Command};
use super::config::{load_config, resolve, Resolved, RunFlags};
use super::errors::CliResult;
use super::io::write_json;
use crate::admin::{ConnectionAdministrator, PgConnector};
use crate::failover::{full_update, preflight_only, ExitStatus};
use crate::observability::{init_logging, level_for};
use crate::pool::{PgBouncerConsole, PoolController};
use crate::preflight::ConnectionPolicy;
use crate::steps::{SqlPatchUpgrade, SqlSecurityReset};

/// Main CLI entry point
///
/// Parses arguments, installs logging and dispatches. This is the only
/// function that main.rs should call.
pub fn run() -> CliResult<i32> {
    let cli = Cli::parse_args();
    init_logging(level_for(cli.verbose, cli.quiet), cli.log_format);
    run_command(&cli)
}

pub fn run_command(cli: &Cli) -> CliResult<i32> {
    let config = load_config(cli)?;
    match &cli.command {
        Command::Run {
            upgrade_dir,
            security_sql,
            dry_run,
        } => {
            let flags = RunFlags {
                upgrade_dir: upgrade_dir.clone(),
                security_sql: security_sql.clone(),
                dry_run: *dry_run,
            };
            update(resolve(cli, config, flags)?)
        }
        Command::Check { connections } => {
            check(resolve(cli, config, RunFlags::default())?, *connections)
        }
        Command::Topology => topology(resolve(cli, config, RunFlags::default())?),
    }
}

/// Full update; prints the run report.
pub fn update(resolved: Resolved) -> CliResult<i32> {
    let console = open_console(&resolved)?;
    let report = full_update(
        resolved.settings,
        Box::new(connector(resolved.connect_timeout)),
        Box::new(console),
        Box::new(SqlPatchUpgrade::new(resolved.upgrade_dir)),
        Box::new(SqlSecurityReset::new(resolved.security_sql)),
    );
    write_json(&report)?;
    Ok(report.exit_code)
}

/// Preflight only; 0 on pass, 99 on failure.
pub fn check(resolved: Resolved, policy: ConnectionPolicy) -> CliResult<i32> {
    let console = open_console(&resolved)?;
    let status = preflight_only(
        &resolved.settings,
        Box::new(connector(resolved.connect_timeout)),
        Box::new(console),
        policy,
    );
    Ok(status.code())
}

/// Discover and print the topology.
pub fn topology(resolved: Resolved) -> CliResult<i32> {
    let console = open_console(&resolved)?;
    let admin = ConnectionAdministrator::new(Box::new(connector(resolved.connect_timeout)));
    match PoolController::discover(
        Box::new(console),
        &admin,
        &resolved.settings.dbname,
        &resolved.settings.dbuser,
    ) {
        Ok(pools) => {
            write_json(&pools.topology().summary())?;
            Ok(ExitStatus::Success.code())
        }
        Err(e) => {
            error!(error = %e, "topology discovery failed");
            Ok(ExitStatus::from(&e).code())
        }
    }
}

fn open_console(resolved: &Resolved) -> CliResult<PgBouncerConsole> {
    Ok(PgBouncerConsole::connect(&resolved.pgbouncer)?)
}

fn connector(timeout: Option<std::time::Duration>) -> PgConnector {
    match timeout {
        Some(timeout) => PgConnector::new().with_connect_timeout(timeout),
        None => PgConnector::new(),
    }
}
