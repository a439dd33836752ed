//! Advisory `flock(2)` locks on open descriptors.
//!
//! Locks belong to the open file description: closing the descriptor releases
//! them, and calling `flock` again on a descriptor that already holds a lock
//! converts it (this is how an exclusive lock is downgraded to shared).
//! The conversion is not atomic; the kernel drops the old lock before granting
//! the new one.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

/// Kind of advisory lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlockMode {
    /// Any number of holders, excluded only by an exclusive lock.
    Shared,
    /// A single holder.
    Exclusive,
}

/// Place an advisory lock on `file`.
///
/// Returns `Ok(false)` only for a non-blocking request that would have to
/// wait. A blocking request interrupted by a signal fails with
/// `ErrorKind::Interrupted` so callers can abandon the wait.
pub fn flock(file: &File, mode: FlockMode, blocking: bool) -> io::Result<bool> {
    let mut operation = match mode {
        FlockMode::Shared => libc::LOCK_SH,
        FlockMode::Exclusive => libc::LOCK_EX,
    };
    if !blocking {
        operation |= libc::LOCK_NB;
    }

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if rc == 0 {
        return Ok(true);
    }

    let err = io::Error::last_os_error();
    if !blocking && err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}
