//! JSON output for CLI
//!
//! - Output: a single pretty-printed JSON document on stdout
//! - Logs never go to stdout

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

/// Write `value` as JSON to stdout
pub fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    write_json_to(&mut stdout, value)
}

pub fn write_json_to<W: Write, T: Serialize>(out: &mut W, value: &T) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
