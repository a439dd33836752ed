//! Command implementations for pidfilelock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Each command returns the process exit code on success.

mod hold;
mod mkdir;
mod observe;
mod run;
mod status;

use crate::cli::{Cli, Command};
use pidfilelock::config::Config;
use pidfilelock::error::{PidLockError, Result};
use std::io::{self, BufRead, Write};

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. The config file, if
/// given, is loaded once and handed to every command.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Hold(args) => hold::cmd_hold(args, &config),
        Command::Observe(args) => observe::cmd_observe(args),
        Command::Status(args) => status::cmd_status(args),
        Command::Run(args) => run::cmd_run(args, &config),
        Command::Mkdir(args) => mkdir::cmd_mkdir(args, &config),
    }
}

/// Print a protocol line and make sure it leaves the process immediately.
pub(crate) fn announce(line: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line)
        .and_then(|()| stdout.flush())
        .map_err(|e| PidLockError::io("failed to write to stdout", e))
}

/// Block until a line (or end of input) arrives on stdin.
pub(crate) fn wait_for_line() -> Result<()> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| PidLockError::io("failed to read from stdin", e))?;
    Ok(())
}
