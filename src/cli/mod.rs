//! CLI argument parsing for pidfilelock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use pidfilelock::config::{Config, FileMode};
use pidfilelock::error::Result;
use pidfilelock::identity::IdSpec;
use std::path::PathBuf;

/// pidfilelock: PID file locks between processes.
///
/// A lock file holds the PID of its owner and is protected by advisory
/// locks, so files left behind by crashed processes never block new owners.
#[derive(Parser, Debug)]
#[command(name = "pidfilelock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log the locking protocol (same as PIDFILELOCK_LOG=debug).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for pidfilelock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take the lock and hold it until a line arrives on stdin.
    ///
    /// Prints `locked <pid>` once the lock is held and `released` after it
    /// has been let go.
    Hold(HoldArgs),

    /// Take a read lock and hold it until a line arrives on stdin.
    ///
    /// Prints `observing <pid>` once locked. Fails if nobody holds the lock.
    Observe(ObserveArgs),

    /// Show who holds a lock and whether that process is running.
    Status(StatusArgs),

    /// Run a command while holding the lock, unless another process holds it.
    ///
    /// Exits with the command's status, or reports the running holder.
    Run(RunArgs),

    /// Create a directory suitable for lock files.
    Mkdir(MkdirArgs),
}

/// Options for creating the lock file, overriding the config file.
#[derive(Args, Debug, Default)]
pub struct LockArgs {
    /// Mode for a newly created lock file (octal).
    #[arg(long)]
    pub mode: Option<FileMode>,

    /// Group to give the lock file (name or GID).
    #[arg(long)]
    pub group: Option<IdSpec>,

    /// Forcibly remove lock files we cannot write to.
    #[arg(long)]
    pub unsafe_cleanup: bool,
}

impl LockArgs {
    /// Apply the flags that were given on top of `config`.
    ///
    /// The merged config goes through the same validation as a config file.
    pub fn apply(&self, config: &Config) -> Result<Config> {
        let mut config = config.clone();
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(group) = &self.group {
            config.group = Some(group.clone());
        }
        if self.unsafe_cleanup {
            config.unsafe_cleanup = true;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    /// Path to the lock file.
    pub path: PathBuf,

    /// Fail instead of waiting when another process holds the lock.
    #[arg(long)]
    pub no_block: bool,

    /// Wait for readers to let go before removing the lock file.
    #[arg(long)]
    pub drain: bool,

    #[command(flatten)]
    pub lock: LockArgs,
}

/// Arguments for the `observe` command.
#[derive(Parser, Debug)]
pub struct ObserveArgs {
    /// Path to the lock file.
    pub path: PathBuf,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Path to the lock file.
    pub path: PathBuf,

    /// Print the status as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the lock file.
    pub path: PathBuf,

    /// Remove the lock file without waiting for readers to let go.
    #[arg(long)]
    pub no_drain: bool,

    #[command(flatten)]
    pub lock: LockArgs,

    /// Command to run while holding the lock.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Arguments for the `mkdir` command.
#[derive(Parser, Debug)]
pub struct MkdirArgs {
    /// Directory to create.
    pub path: PathBuf,

    /// Mode for the directory (octal).
    #[arg(long)]
    pub mode: Option<FileMode>,

    /// Owner of the directory (name or UID).
    #[arg(long)]
    pub user: Option<IdSpec>,

    /// Group of the directory (name or GID).
    #[arg(long)]
    pub group: Option<IdSpec>,

    /// Create missing parent directories.
    #[arg(short, long)]
    pub parents: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
