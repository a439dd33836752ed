//! Implementation of the `pidfilelock mkdir` command.

use crate::cli::MkdirArgs;
use pidfilelock::config::Config;
use pidfilelock::error::Result;
use pidfilelock::exit_codes;
use pidfilelock::fs::{LockDirOptions, mklockdir};

/// Execute the `pidfilelock mkdir` command.
///
/// An existing directory is accepted; its ownership is still adjusted.
pub fn cmd_mkdir(args: MkdirArgs, config: &Config) -> Result<i32> {
    let options = LockDirOptions {
        mode: args.mode.unwrap_or(config.lock_dir_mode).bits(),
        user: args.user,
        group: args.group,
        parents: args.parents,
        exist_ok: true,
    };
    mklockdir(&args.path, &options)?;

    Ok(exit_codes::SUCCESS)
}
