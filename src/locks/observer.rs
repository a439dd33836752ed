//! The observer role: read who holds the lock without ever creating it.

use super::base::{PidContent, PidHandle, still_linked};
use crate::error::{PidLockError, Result};
use crate::fs::{FlockMode, flock};
use crate::process::pid_is_running;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only view of a PID file.
///
/// Holding the shared lock guarantees the content is complete, and it makes a
/// holder releasing with `drain` wait for us. Dropping the handle releases it.
#[derive(Debug)]
pub struct PidFile {
    handle: PidHandle,
}

impl PidFile {
    /// Create a handle. Does not touch the filesystem.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            handle: PidHandle::new(path.into()),
        }
    }

    /// Open and lock the file in one step; `None` if nobody holds the lock.
    pub fn open_locked<P: Into<PathBuf>>(path: P) -> Result<Option<Self>> {
        let mut file = Self::new(path);
        Ok(file.acquire()?.then_some(file))
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Whether this handle currently holds a shared lock.
    pub fn is_locked(&self) -> bool {
        self.handle.is_locked()
    }

    /// Take a shared lock on the file.
    ///
    /// Returns `Ok(false)` when there is no file, which means there is no
    /// holder. Waits only while a holder is in the middle of acquiring.
    pub fn acquire(&mut self) -> Result<bool> {
        if self.is_locked() {
            return Err(PidLockError::AlreadyLocked(self.path().to_path_buf()));
        }

        loop {
            let file = match File::open(self.path()) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(self.io_error("failed to open PID file", e)),
            };
            flock(&file, FlockMode::Shared, true)
                .map_err(|e| self.io_error("failed to lock PID file", e))?;

            let metadata = file
                .metadata()
                .map_err(|e| self.io_error("failed to stat PID file", e))?;
            let linked = still_linked(&metadata, self.path())
                .map_err(|e| self.io_error("failed to stat PID file", e))?;
            if !linked {
                debug!(
                    "PID file '{}' was removed between opening and read locking it, attempting again",
                    self.path().display()
                );
                continue;
            }

            self.handle.hold(file);
            debug!("PID file read lock acquired '{}'", self.path().display());
            return Ok(true);
        }
    }

    /// Drop the shared lock.
    pub fn release(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Err(PidLockError::NotLocked(self.path().to_path_buf())),
        }
    }

    /// PID of the holder, `None` when there is no file or no PID in it yet.
    ///
    /// Locks transiently when not already locked.
    pub fn pid(&mut self) -> Result<Option<u32>> {
        self.with_lock(None, |path, file| read_pid(path, file))
    }

    /// Whether the process named in the file is running.
    ///
    /// Locks transiently when not already locked.
    pub fn is_running(&mut self) -> Result<bool> {
        self.with_lock(false, |path, file| {
            Ok(read_pid(path, file)?.is_some_and(pid_is_running))
        })
    }

    /// Run `f` under a shared lock, taking one only for the duration if needed.
    fn with_lock<T>(
        &mut self,
        unlocked: T,
        f: impl FnOnce(&Path, &File) -> Result<T>,
    ) -> Result<T> {
        if let Some(file) = self.handle.file() {
            return f(self.handle.path(), file);
        }

        if !self.acquire()? {
            return Ok(unlocked);
        }
        let result = match self.handle.file() {
            Some(file) => f(self.handle.path(), file),
            None => Ok(unlocked),
        };
        self.release()?;
        result
    }

    fn io_error(&self, what: &str, source: io::Error) -> PidLockError {
        PidLockError::io(format!("{} '{}'", what, self.path().display()), source)
    }
}

fn read_pid(path: &Path, file: &File) -> Result<Option<u32>> {
    let content = PidContent::read(file).map_err(|e| {
        PidLockError::io(format!("failed to read PID file '{}'", path.display()), e)
    })?;
    match content {
        PidContent::Pid(pid) => Ok(Some(pid)),
        PidContent::Empty => Ok(None),
        PidContent::Invalid(content) => Err(PidLockError::InvalidPid {
            path: path.to_path_buf(),
            content,
        }),
    }
}
