//! pgswitch entry point
//!
//! Parses nothing and loads nothing itself; everything is delegated to
//! the CLI module. The exit code is the command's.

use pgswitch::cli;

fn main() {
    match cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
