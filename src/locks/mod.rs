//! PID file locking.
//!
//! A lock file contains the decimal PID of its owner and is protected by
//! `flock(2)` advisory locks:
//! - [`PidLock`] takes the file exclusively, writes its PID, then downgrades
//!   to a shared lock so the file can be read while held. Release unlinks it.
//! - [`PidFile`] takes a shared lock to read the PID of the owner and check
//!   that it is alive. It never creates or removes the file.
//! - [`opportunistic_lock`] becomes the owner if it can and an observer of the
//!   current owner otherwise.
//!
//! # Residue
//!
//! A process that dies while holding the lock leaves the file behind, but its
//! advisory lock dies with it. The next owner verifies the file after locking
//! it: the path must still lead to the locked inode, the PID inside must not
//! be running, and the file must be owned by our user (otherwise it is
//! unlinked and recreated).

mod base;
mod exclusive;
mod guard;
mod observer;
mod opportunistic;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use exclusive::PidLock;
pub use guard::ExclusiveGuard;
pub use observer::PidFile;
pub use opportunistic::{Role, opportunistic_lock};
pub use types::{DEFAULT_LOCK_MODE, LockOptions};
