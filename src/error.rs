//! Error types for pidfilelock.
//!
//! Uses thiserror for derive macros. Races discovered while acquiring a lock
//! never surface here; they are retried inside the acquisition loop.

use crate::exit_codes;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pidfilelock operations.
#[derive(Error, Debug)]
pub enum PidLockError {
    /// `acquire` was called on a handle that already holds its lock.
    #[error("lock '{}' is already held by this handle", .0.display())]
    AlreadyLocked(PathBuf),

    /// `release` was called on a handle that does not hold its lock.
    #[error("lock '{}' is not held by this handle", .0.display())]
    NotLocked(PathBuf),

    /// The lock file exists but we are not allowed to open it for writing.
    #[error("permission denied opening lock file '{}': {source}", path.display())]
    PermissionDenied { path: PathBuf, source: io::Error },

    /// Forced removal of an unwritable lock file was requested.
    #[error("unsafe cleanup of lock file '{}' is not implemented", .0.display())]
    UnsafeCleanupUnsupported(PathBuf),

    /// The lock file holds something other than a decimal PID.
    #[error("lock file '{}' contains an invalid PID: {content:?}", path.display())]
    InvalidPid { path: PathBuf, content: String },

    /// No such user in the user database.
    #[error("unknown user '{0}'")]
    UnknownUser(String),

    /// No such group in the group database.
    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    /// The lock is held by another process (CLI only).
    #[error("lock '{}' is held by process {}", path.display(), describe_pid(pid))]
    Busy { path: PathBuf, pid: Option<u32> },

    /// Underlying I/O failure.
    #[error("{context}: {source}")]
    Io { context: String, source: io::Error },

    /// Invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),
}

impl PidLockError {
    /// Wrap an I/O error with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        PidLockError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PidLockError::AlreadyLocked(_) | PidLockError::NotLocked(_) => exit_codes::USER_ERROR,
            PidLockError::UnknownUser(_) | PidLockError::UnknownGroup(_) => exit_codes::USER_ERROR,
            PidLockError::UserError(_) => exit_codes::USER_ERROR,
            PidLockError::PermissionDenied { .. } => exit_codes::IO_FAILURE,
            PidLockError::UnsafeCleanupUnsupported(_) => exit_codes::IO_FAILURE,
            PidLockError::InvalidPid { .. } => exit_codes::IO_FAILURE,
            PidLockError::Io { .. } => exit_codes::IO_FAILURE,
            PidLockError::Busy { .. } => exit_codes::LOCK_BUSY,
        }
    }
}

fn describe_pid(pid: &Option<u32>) -> String {
    match pid {
        Some(pid) => pid.to_string(),
        None => "unknown".to_string(),
    }
}

/// Result type alias for pidfilelock operations.
pub type Result<T> = std::result::Result<T, PidLockError>;
