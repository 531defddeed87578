//! Log subscriber setup
//!
//! Logs go to stderr. stdout is reserved for JSON output.

use std::io;

use clap::ValueEnum;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Map `-v`/`-q` counts onto a level. INFO is the default.
pub fn level_for(verbose: u8, quiet: u8) -> LevelFilter {
    const LEVELS: [LevelFilter; 6] = [
        LevelFilter::OFF,
        LevelFilter::ERROR,
        LevelFilter::WARN,
        LevelFilter::INFO,
        LevelFilter::DEBUG,
        LevelFilter::TRACE,
    ];
    let index = (3 + i16::from(verbose) - i16::from(quiet)).clamp(0, 5) as usize;
    LEVELS[index]
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
///
/// Returns false when a subscriber was already installed.
pub fn init_logging(level: LevelFilter, format: LogFormat) -> bool {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_is_info() {
        assert_eq!(level_for(0, 0), LevelFilter::INFO);
    }

    #[test]
    fn test_verbosity_counts() {
        assert_eq!(level_for(1, 0), LevelFilter::DEBUG);
        assert_eq!(level_for(2, 0), LevelFilter::TRACE);
        assert_eq!(level_for(9, 0), LevelFilter::TRACE);
        assert_eq!(level_for(0, 1), LevelFilter::WARN);
        assert_eq!(level_for(0, 2), LevelFilter::ERROR);
        assert_eq!(level_for(0, 5), LevelFilter::OFF);
        assert_eq!(level_for(1, 1), LevelFilter::INFO);
    }

    #[test]
    fn test_second_init_reports_false() {
        init_logging(LevelFilter::INFO, LogFormat::Text);
        assert!(!init_logging(LevelFilter::INFO, LogFormat::Json));
    }
}
