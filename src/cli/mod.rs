//! CLI module for pgswitch
//!
//! Provides command-line interface for:
//! - run: full update with minimal outage
//! - check: preflight checks only
//! - topology: print the discovered pool topology

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, run, run_command, topology, update};
pub use config::{load_config, resolve, Config, Resolved, RunFlags};
pub use errors::{CliError, CliResult};
pub use io::{write_json, write_json_to};
