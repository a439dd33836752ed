//! Implementation of the `pidfilelock observe` command.

use super::{announce, wait_for_line};
use crate::cli::ObserveArgs;
use pidfilelock::error::Result;
use pidfilelock::exit_codes;
use pidfilelock::locks::PidFile;

/// Execute the `pidfilelock observe` command.
///
/// Holds a read lock, which keeps a holder releasing with `--drain` waiting,
/// until a line arrives on stdin. Exits with `USER_ERROR` when nobody holds
/// the lock.
pub fn cmd_observe(args: ObserveArgs) -> Result<i32> {
    let Some(mut file) = PidFile::open_locked(&args.path)? else {
        eprintln!("No lock file at '{}'", args.path.display());
        return Ok(exit_codes::USER_ERROR);
    };

    let pid = file.pid()?;
    announce(&format!(
        "observing {}",
        pid.map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
    ))?;

    wait_for_line()?;
    file.release()?;

    Ok(exit_codes::SUCCESS)
}
