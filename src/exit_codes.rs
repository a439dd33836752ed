//! Exit code constants for the pidfilelock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, misuse of a handle)
//! - 2: I/O or permission failure
//! - 4: Lock is held by another process
//!
//! `run` exits with the child's own status when it ran the command.

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or unknown user/group.
pub const USER_ERROR: i32 = 1;

/// I/O failure: the lock file or directory could not be accessed.
pub const IO_FAILURE: i32 = 2;

/// The lock is held by another process.
pub const LOCK_BUSY: i32 = 4;
