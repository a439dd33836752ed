//! The exclusive role: the process that owns the PID file.

use super::base::{PidContent, PidHandle, still_linked};
use super::types::LockOptions;
use crate::error::{PidLockError, Result};
use crate::fs::{FlockMode, flock};
use crate::identity::resolve_group;
use crate::process::{current_pid, effective_uid, pid_is_running};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// First pause after finding a running PID in a file we locked.
const OWNER_BACKOFF_START: Duration = Duration::from_millis(1);

/// Longest pause between attempts on a file naming a running PID.
const OWNER_BACKOFF_MAX: Duration = Duration::from_millis(64);

/// Attempts a non-blocking acquire makes on a file naming a running PID
/// before reporting the lock as taken.
const NON_BLOCKING_OWNER_ATTEMPTS: u32 = 8;

/// Steps of one acquisition attempt.
///
/// Every failed verification goes back to `Opening` with a fresh descriptor.
#[derive(Debug)]
enum AcquireState {
    Opening,
    Locking(File),
    Verifying(File),
    Held(File),
}

/// Outcome of checking an exclusively locked descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Verdict {
    /// We own the file.
    Legitimate,
    /// The path was unlinked or now names a different file.
    Replaced,
    /// The previous owner is alive and is about to take its shared lock back.
    OwnerAlive(u32),
    /// The file belongs to another user and has to be removed.
    ForeignOwner(u32),
}

/// Exclusive PID file lock.
///
/// While held, the file at `path` contains our PID and we keep a shared lock
/// on it so observers can read it. Release removes the file. A handle dropped
/// while holding releases without waiting for observers.
///
/// Everyone who may take the lock needs write access to the file and to its
/// directory, and the directory must not have the sticky bit set.
#[derive(Debug)]
pub struct PidLock {
    handle: PidHandle,
    mode: u32,
    group: Option<u32>,
    unsafe_cleanup: bool,
}

impl PidLock {
    /// Create a handle with default options. Does not touch the filesystem.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let options = LockOptions::default();
        Self {
            handle: PidHandle::new(path.into()),
            mode: options.mode,
            group: None,
            unsafe_cleanup: options.unsafe_cleanup,
        }
    }

    /// Create a handle with explicit options, resolving the group name now.
    pub fn with_options<P: Into<PathBuf>>(path: P, options: &LockOptions) -> Result<Self> {
        let group = options.group.as_ref().map(resolve_group).transpose()?;
        Ok(Self {
            handle: PidHandle::new(path.into()),
            mode: options.mode,
            group,
            unsafe_cleanup: options.unsafe_cleanup,
        })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Whether this handle currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.handle.is_locked()
    }

    /// PID recorded in the held lock file.
    pub fn pid(&self) -> Result<Option<u32>> {
        let file = self
            .handle
            .file()
            .ok_or_else(|| PidLockError::NotLocked(self.path().to_path_buf()))?;
        match PidContent::read(file).map_err(|e| self.io_error("failed to read lock file", e))? {
            PidContent::Pid(pid) => Ok(Some(pid)),
            PidContent::Empty => Ok(None),
            PidContent::Invalid(content) => Err(PidLockError::InvalidPid {
                path: self.path().to_path_buf(),
                content,
            }),
        }
    }

    /// Take the lock and write our PID into the file.
    ///
    /// With `blocking` this waits for the current owner and never returns
    /// `Ok(false)`. Without it, `Ok(false)` means someone else holds the lock,
    /// or the file kept naming a running process over several attempts.
    ///
    /// A file naming a running process that is not holding the lock (a
    /// reused PID) makes a blocking acquire retry with back-off until that
    /// process exits.
    pub fn acquire(&mut self, blocking: bool) -> Result<bool> {
        if self.is_locked() {
            return Err(PidLockError::AlreadyLocked(self.path().to_path_buf()));
        }

        let mut owner_attempts = 0;
        let mut state = AcquireState::Opening;
        let file = loop {
            state = match state {
                AcquireState::Opening => AcquireState::Locking(self.open()?),
                AcquireState::Locking(file) => {
                    if !self.lock(&file, FlockMode::Exclusive, false)? {
                        if !blocking {
                            return Ok(false);
                        }
                        info!("Waiting for PID file lock '{}'", self.path().display());
                        self.lock(&file, FlockMode::Exclusive, true)?;
                    }
                    debug!("PID file exclusively locked '{}'", self.path().display());
                    AcquireState::Verifying(file)
                }
                AcquireState::Verifying(file) => match self.verify(&file)? {
                    Verdict::Legitimate => AcquireState::Held(file),
                    Verdict::Replaced => {
                        debug!(
                            "PID file '{}' was removed between opening and locking it, attempting again",
                            self.path().display()
                        );
                        AcquireState::Opening
                    }
                    Verdict::OwnerAlive(pid) => {
                        owner_attempts += 1;
                        if !blocking && owner_attempts >= NON_BLOCKING_OWNER_ATTEMPTS {
                            debug!(
                                "PID file '{}' still names running process {}, giving up",
                                self.path().display(),
                                pid
                            );
                            return Ok(false);
                        }
                        debug!(
                            "PID file '{}' belongs to running process {}, attempting again",
                            self.path().display(),
                            pid
                        );
                        // Let the owner finish converting its lock to shared.
                        thread::sleep(owner_backoff(owner_attempts));
                        AcquireState::Opening
                    }
                    Verdict::ForeignOwner(uid) => {
                        debug!(
                            "PID file '{}' is owned by UID {}, removing it and attempting again",
                            self.path().display(),
                            uid
                        );
                        self.unlink()?;
                        AcquireState::Opening
                    }
                },
                AcquireState::Held(file) => break file,
            };
        };

        if let Err(e) = self.claim(&file) {
            // Do not leave a half-written file carrying a live PID behind.
            if let Err(cleanup) = self.unlink() {
                warn!(
                    "Failed to remove half-claimed PID file '{}': {}",
                    self.path().display(),
                    cleanup
                );
            }
            return Err(e);
        }
        self.handle.hold(file);
        debug!("PID file lock acquired '{}'", self.path().display());
        Ok(true)
    }

    /// Release the lock and remove the file.
    ///
    /// With `drain` this first waits until no observer holds a shared lock,
    /// so nobody is left reading a file that is about to disappear. A signal
    /// interrupting that wait surfaces as an `Interrupted` I/O error; the lock
    /// is then still held and the file still in place.
    pub fn release(&mut self, drain: bool) -> Result<()> {
        let Some(file) = self.handle.file() else {
            return Err(PidLockError::NotLocked(self.path().to_path_buf()));
        };

        if drain && let Err(e) = self.drain(file) {
            self.restore_shared(file);
            return Err(e);
        }

        if let Err(e) = self.unlink() {
            if drain {
                self.restore_shared(file);
            }
            return Err(e);
        }

        // Closing only after the unlink keeps the file locked until the path
        // no longer leads to it.
        drop(self.handle.take());
        debug!("PID file lock released '{}'", self.path().display());
        Ok(())
    }

    fn open(&self) -> Result<File> {
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(self.mode)
            .open(self.path())
        {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                if self.unsafe_cleanup {
                    Err(PidLockError::UnsafeCleanupUnsupported(
                        self.path().to_path_buf(),
                    ))
                } else {
                    Err(PidLockError::PermissionDenied {
                        path: self.path().to_path_buf(),
                        source: e,
                    })
                }
            }
            Err(e) => Err(self.io_error("failed to open lock file", e)),
        }
    }

    /// Convert our lock to exclusive, waiting for observers to let go.
    fn drain(&self, file: &File) -> Result<()> {
        if !self.lock(file, FlockMode::Exclusive, false)? {
            info!(
                "Waiting for all locks on '{}' to be unlocked",
                self.path().display()
            );
            self.lock(file, FlockMode::Exclusive, true)?;
        }
        Ok(())
    }

    /// Take the shared lock back after a failed conversion.
    ///
    /// The kernel drops the old lock before trying the new one, so a failed
    /// conversion leaves the descriptor unlocked.
    fn restore_shared(&self, file: &File) {
        if let Err(e) = flock(file, FlockMode::Shared, true) {
            warn!(
                "Failed to restore read lock on PID file '{}': {}",
                self.path().display(),
                e
            );
        }
    }

    fn lock(&self, file: &File, mode: FlockMode, blocking: bool) -> Result<bool> {
        flock(file, mode, blocking).map_err(|e| self.io_error("failed to lock PID file", e))
    }

    /// Decide whether an exclusively locked descriptor really makes us the owner.
    ///
    /// The exclusive lock alone is not proof: the path may have been replaced
    /// while we waited, the lock may have been granted in the gap of another
    /// owner's downgrade, or the file may be residue from another user.
    pub(super) fn verify(&self, file: &File) -> Result<Verdict> {
        let metadata = file
            .metadata()
            .map_err(|e| self.io_error("failed to stat lock file", e))?;
        let linked = still_linked(&metadata, self.path())
            .map_err(|e| self.io_error("failed to stat lock file", e))?;
        if !linked {
            return Ok(Verdict::Replaced);
        }

        match PidContent::read(file).map_err(|e| self.io_error("failed to read lock file", e))? {
            PidContent::Pid(pid) if pid_is_running(pid) => return Ok(Verdict::OwnerAlive(pid)),
            PidContent::Invalid(content) => warn!(
                "PID file '{}' contains garbage {:?}, taking it over",
                self.path().display(),
                content
            ),
            PidContent::Pid(_) | PidContent::Empty => {}
        }

        if metadata.uid() != effective_uid() {
            return Ok(Verdict::ForeignOwner(metadata.uid()));
        }
        Ok(Verdict::Legitimate)
    }

    /// Write our PID into a verified file and let observers in.
    fn claim(&self, mut file: &File) -> Result<()> {
        if let Some(gid) = self.group {
            std::os::unix::fs::fchown(file, None, Some(gid))
                .map_err(|e| self.io_error("failed to set lock file group", e))?;
        }
        file.set_len(0)
            .map_err(|e| self.io_error("failed to truncate lock file", e))?;
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(current_pid().to_string().as_bytes()))
            .map_err(|e| self.io_error("failed to write PID to lock file", e))?;
        self.lock(file, FlockMode::Shared, true)?;
        Ok(())
    }

    fn unlink(&self) -> Result<()> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error("failed to remove lock file", e)),
        }
    }

    fn io_error(&self, what: &str, source: io::Error) -> PidLockError {
        PidLockError::io(format!("{} '{}'", what, self.path().display()), source)
    }
}

/// Pause before the `attempt`-th retry on a file naming a running PID.
fn owner_backoff(attempt: u32) -> Duration {
    OWNER_BACKOFF_START
        .saturating_mul(1 << attempt.saturating_sub(1).min(16))
        .min(OWNER_BACKOFF_MAX)
}

impl Drop for PidLock {
    fn drop(&mut self) {
        if self.is_locked()
            && let Err(e) = self.release(false)
        {
            warn!(
                "Failed to release PID file lock '{}': {}",
                self.path().display(),
                e
            );
        }
    }
}
