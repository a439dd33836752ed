//! Implementation of the `pidfilelock status` command.
//!
//! Reads the lock under a shared lock so the reported PID is never half
//! written, and reports whether that process is still alive.

use crate::cli::StatusArgs;
use chrono::{DateTime, Utc};
use pidfilelock::error::{PidLockError, Result};
use pidfilelock::exit_codes;
use pidfilelock::locks::PidFile;
use pidfilelock::process::pid_is_running;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What `status` found at a lock path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub path: PathBuf,
    /// Whether a lock file exists.
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub running: bool,
    /// When the holder wrote its PID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl StatusReport {
    /// Inspect the lock at `path`.
    pub fn collect(path: &Path) -> Result<Self> {
        let Some(mut file) = PidFile::open_locked(path)? else {
            return Ok(Self {
                path: path.to_path_buf(),
                present: false,
                pid: None,
                running: false,
                since: None,
            });
        };

        let pid = file.pid()?;
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| {
                PidLockError::io(format!("failed to stat PID file '{}'", path.display()), e)
            })?;
        file.release()?;

        Ok(Self {
            path: path.to_path_buf(),
            present: true,
            pid,
            running: pid.is_some_and(pid_is_running),
            since: Some(DateTime::<Utc>::from(modified)),
        })
    }
}

/// Execute the `pidfilelock status` command.
pub fn cmd_status(args: StatusArgs) -> Result<i32> {
    let report = StatusReport::collect(&args.path)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| {
            PidLockError::UserError(format!("failed to serialize status: {}", e))
        })?;
        println!("{}", json);
        return Ok(exit_codes::SUCCESS);
    }

    println!("Lock:       {}", report.path.display());
    if !report.present {
        println!("Status:     not held");
        return Ok(exit_codes::SUCCESS);
    }

    match report.pid {
        Some(pid) if report.running => println!("Holder:     {} (running)", pid),
        Some(pid) => println!("Holder:     {} (not running, stale)", pid),
        None => println!("Holder:     unknown"),
    }
    if let Some(since) = report.since {
        println!("Since:      {}", since.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(exit_codes::SUCCESS)
}
