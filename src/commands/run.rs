//! Implementation of the `pidfilelock run` command.
//!
//! Runs a command only if no other instance holds the lock; otherwise reports
//! the instance that does.

use crate::cli::RunArgs;
use pidfilelock::config::Config;
use pidfilelock::error::{PidLockError, Result};
use pidfilelock::exit_codes;
use pidfilelock::locks::{Role, opportunistic_lock};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};
use tracing::debug;

/// Execute the `pidfilelock run` command.
///
/// As the holder, runs the command and exits with its status; the lock is
/// released once the command finishes. As an observer, fails with
/// `PidLockError::Busy` naming the running holder.
pub fn cmd_run(args: RunArgs, config: &Config) -> Result<i32> {
    let config = args.lock.apply(config)?;
    let drain = !args.no_drain;

    match opportunistic_lock(&args.path, &config.lock_options(), drain)? {
        Role::Holder(guard) => {
            let (program, rest) = args
                .command
                .split_first()
                .ok_or_else(|| PidLockError::UserError("no command given".to_string()))?;
            debug!("Running {:?} while holding '{}'", args.command, args.path.display());

            let status = Command::new(program).args(rest).status().map_err(|e| {
                PidLockError::io(format!("failed to run '{}'", program), e)
            })?;
            guard.release()?;

            Ok(exit_code_of(status))
        }
        Role::Observer(mut file) => {
            let pid = file.pid()?;
            Err(PidLockError::Busy {
                path: args.path,
                pid,
            })
        }
    }
}

/// Map a child's status to our exit code, shell style for signals.
fn exit_code_of(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => exit_codes::IO_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_passes_through() {
        let status = Command::new("sh").args(["-c", "exit 3"]).status().unwrap();
        assert_eq!(exit_code_of(status), 3);
    }

    #[test]
    fn signal_maps_to_shell_convention() {
        let status = Command::new("sh")
            .args(["-c", "kill -TERM $$"])
            .status()
            .unwrap();
        assert_eq!(exit_code_of(status), 128 + libc::SIGTERM);
    }
}
