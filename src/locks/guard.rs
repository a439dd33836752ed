//! RAII guard for the exclusive role.

use super::exclusive::PidLock;
use crate::error::Result;
use std::path::Path;
use tracing::warn;

/// Holds a [`PidLock`] for a scope.
///
/// When dropped, the lock is released (waiting for observers if `drain` was
/// requested) and the PID file removed. If the release fails, a warning is
/// logged but no panic occurs; call [`ExclusiveGuard::release`] to see the
/// error instead.
#[derive(Debug)]
pub struct ExclusiveGuard {
    lock: PidLock,
    drain: bool,
    /// Set once `release` ran, so dropping does not try again.
    released: bool,
}

impl ExclusiveGuard {
    /// Wrap a lock that is already held.
    pub(super) fn new(lock: PidLock, drain: bool) -> Self {
        debug_assert!(lock.is_locked());
        Self {
            lock,
            drain,
            released: false,
        }
    }

    /// Block until `lock` is acquired.
    pub fn acquire(mut lock: PidLock, drain: bool) -> Result<Self> {
        lock.acquire(true)?;
        Ok(Self::new(lock, drain))
    }

    /// Acquire `lock` if nobody else holds it.
    pub fn try_acquire(mut lock: PidLock, drain: bool) -> Result<Option<Self>> {
        if lock.acquire(false)? {
            Ok(Some(Self::new(lock, drain)))
        } else {
            Ok(None)
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        self.lock.path()
    }

    /// The underlying lock.
    pub fn lock(&self) -> &PidLock {
        &self.lock
    }

    /// Release the lock now and report any failure.
    ///
    /// If the drain wait is interrupted by a signal, the error is returned
    /// right away and the lock is released without waiting for observers.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.release(self.drain)
    }
}

impl Drop for ExclusiveGuard {
    fn drop(&mut self) {
        if !self.released
            && self.lock.is_locked()
            && let Err(e) = self.lock.release(self.drain)
        {
            warn!(
                "Failed to release PID file lock '{}': {}",
                self.lock.path().display(),
                e
            );
        }
    }
}
