//! CLI argument definitions using clap
//!
//! Commands:
//! - pgswitch run      [--upgrade-dir DIR] [--security-sql FILE] [--dry-run]
//! - pgswitch check    [--connections refuse|ignore|terminate]
//! - pgswitch topology

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::observability::LogFormat;
use crate::preflight::ConnectionPolicy;

/// Full-update controller for PostgreSQL clusters behind pgbouncer
#[derive(Parser, Debug)]
#[command(name = "pgswitch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// pgbouncer admin console connection string
    #[arg(long, global = true, value_name = "CONN_STR")]
    pub pgbouncer: Option<String>,

    /// Logical database to operate on
    #[arg(long, global = true, value_name = "NAME")]
    pub dbname: Option<String>,

    /// Superuser to connect as; its connections are never killed
    #[arg(long, global = true, value_name = "NAME")]
    pub dbuser: Option<String>,

    /// Path to a JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More output; repeat for more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less output; repeat for less
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a full update with minimal outage
    Run {
        /// Directory of *.sql schema patches, applied in name order
        #[arg(long, value_name = "DIR")]
        upgrade_dir: Option<PathBuf>,

        /// SQL script that resets role grants
        #[arg(long, value_name = "FILE")]
        security_sql: Option<PathBuf>,

        /// Roll back the schema and security changes instead of committing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the preflight checks only
    Check {
        /// What to do about connected non-system clients
        #[arg(long, default_value_t = ConnectionPolicy::Refuse)]
        connections: ConnectionPolicy,
    },

    /// Discover and print the pool topology
    Topology,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
