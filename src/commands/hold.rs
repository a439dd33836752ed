//! Implementation of the `pidfilelock hold` command.
//!
//! Takes the exclusive role and keeps it until told to let go on stdin. This
//! is the building block for shell scripts and for tests that need a holder
//! living in another process.

use super::{announce, wait_for_line};
use crate::cli::HoldArgs;
use pidfilelock::config::Config;
use pidfilelock::error::{PidLockError, Result};
use pidfilelock::exit_codes;
use pidfilelock::locks::{PidFile, PidLock};
use pidfilelock::process::current_pid;

/// Execute the `pidfilelock hold` command.
///
/// Output protocol on stdout:
/// - `locked <pid>` once the lock is held
/// - `released` once the lock file has been removed
pub fn cmd_hold(args: HoldArgs, config: &Config) -> Result<i32> {
    let config = args.lock.apply(config)?;
    let mut lock = PidLock::with_options(&args.path, &config.lock_options())?;

    if !lock.acquire(!args.no_block)? {
        let pid = PidFile::new(&args.path).pid().unwrap_or(None);
        return Err(PidLockError::Busy {
            path: args.path,
            pid,
        });
    }
    announce(&format!("locked {}", current_pid()))?;

    wait_for_line()?;

    lock.release(args.drain || config.drain_on_release)?;
    announce("released")?;

    Ok(exit_codes::SUCCESS)
}
