//! Options shared by everything that takes the exclusive role.

use crate::identity::IdSpec;

/// Default lock file mode (`rw-rw-r--`).
pub const DEFAULT_LOCK_MODE: u32 = 0o664;

/// How an exclusive lock file is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Mode for a newly created lock file (the process umask still applies).
    /// Anyone who may take the lock needs write access, anyone who may
    /// observe it needs read access.
    pub mode: u32,

    /// Group to give the lock file instead of our primary group.
    pub group: Option<IdSpec>,

    /// Forcibly remove a lock file we cannot open for writing.
    ///
    /// The recovery cannot check whether the owner is still alive without
    /// racing it, so it is not implemented: acquisition fails with
    /// `PidLockError::UnsafeCleanupUnsupported` where it would kick in.
    pub unsafe_cleanup: bool,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            mode: DEFAULT_LOCK_MODE,
            group: None,
            unsafe_cleanup: false,
        }
    }
}
