//! Become the owner if possible, otherwise attach to the owner.
//!
//! Suits services that run on demand: the first caller does the work, later
//! callers find and talk to it.

use super::exclusive::PidLock;
use super::guard::ExclusiveGuard;
use super::observer::PidFile;
use super::types::LockOptions;
use crate::error::Result;
use std::path::Path;
use tracing::debug;

/// The role [`opportunistic_lock`] ended up with.
#[derive(Debug)]
pub enum Role {
    /// We hold the lock.
    Holder(ExclusiveGuard),
    /// Someone else holds it; the observer is locked and its holder was
    /// running when checked.
    Observer(PidFile),
}

impl Role {
    pub fn is_holder(&self) -> bool {
        matches!(self, Role::Holder(_))
    }

    /// PID of the process holding the lock.
    pub fn pid(&mut self) -> Result<Option<u32>> {
        match self {
            Role::Holder(guard) => guard.lock().pid(),
            Role::Observer(file) => file.pid(),
        }
    }
}

/// Either lock `path` or take a read lock on it, whichever succeeds.
///
/// There is no way to attempt both at once, so this alternates: a
/// non-blocking exclusive attempt, then an observer. An observer that finds no
/// file, or a holder that is no longer running, means the holder went away in
/// between and the exclusive attempt is repeated. A returned holder is
/// released with `drain` when the guard is dropped.
pub fn opportunistic_lock<P: AsRef<Path>>(
    path: P,
    options: &LockOptions,
    drain: bool,
) -> Result<Role> {
    let path = path.as_ref();
    let mut lock = PidLock::with_options(path, options)?;

    loop {
        if lock.acquire(false)? {
            return Ok(Role::Holder(ExclusiveGuard::new(lock, drain)));
        }

        let mut file = PidFile::new(path);
        if file.acquire()? {
            if file.is_running()? {
                return Ok(Role::Observer(file));
            }
            debug!(
                "Holder of PID file '{}' is not running, attempting again",
                path.display()
            );
        } else {
            debug!(
                "PID file '{}' disappeared before it could be read, attempting again",
                path.display()
            );
        }
    }
}
