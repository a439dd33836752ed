//! Creation of directories that hold lock files.
//!
//! Every process that may take a lock needs write access to the directory, and
//! the directory must not have the sticky bit set: recovering residue left by
//! a dead holder means unlinking a file some other user created.

use crate::error::{PidLockError, Result};
use crate::identity::{IdSpec, resolve_group, resolve_user};
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt};
use std::path::Path;
use tracing::{debug, warn};

/// Default mode for lock directories (`rwxrwxr-x`).
pub const DEFAULT_LOCK_DIR_MODE: u32 = 0o775;

const STICKY_BIT: u32 = 0o1000;

/// Options for [`mklockdir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockDirOptions {
    /// Mode for a newly created directory (the process umask still applies).
    pub mode: u32,
    /// Owner the directory should have.
    pub user: Option<IdSpec>,
    /// Group the directory should have.
    pub group: Option<IdSpec>,
    /// Create missing parent directories.
    pub parents: bool,
    /// Accept an already existing directory.
    pub exist_ok: bool,
}

impl Default for LockDirOptions {
    fn default() -> Self {
        Self {
            mode: DEFAULT_LOCK_DIR_MODE,
            user: None,
            group: None,
            parents: false,
            exist_ok: true,
        }
    }
}

/// Create a directory suitable for lock files.
///
/// Ownership is changed only when a requested user or group differs from the
/// current one; the kernel rejects the change if we are not permitted to make
/// it and that is reported as an error rather than ignored.
pub fn mklockdir<P: AsRef<Path>>(path: P, options: &LockDirOptions) -> Result<()> {
    let path = path.as_ref();

    // Resolve names before touching the filesystem.
    let uid = options.user.as_ref().map(resolve_user).transpose()?;
    let gid = options.group.as_ref().map(resolve_group).transpose()?;

    let mut builder = DirBuilder::new();
    builder.recursive(options.parents).mode(options.mode);

    if options.parents && !options.exist_ok && path.exists() {
        return Err(PidLockError::io(
            format!("failed to create lock directory '{}'", path.display()),
            io::Error::from(io::ErrorKind::AlreadyExists),
        ));
    }

    match builder.create(path) {
        Ok(()) => debug!("Created lock directory '{}'", path.display()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && options.exist_ok => {}
        Err(e) => {
            return Err(PidLockError::io(
                format!("failed to create lock directory '{}'", path.display()),
                e,
            ));
        }
    }

    let metadata = fs::metadata(path).map_err(|e| {
        PidLockError::io(format!("failed to stat lock directory '{}'", path.display()), e)
    })?;
    if !metadata.is_dir() {
        return Err(PidLockError::UserError(format!(
            "'{}' exists and is not a directory",
            path.display()
        )));
    }

    let uid = uid.filter(|&uid| uid != metadata.uid());
    let gid = gid.filter(|&gid| gid != metadata.gid());
    if uid.is_some() || gid.is_some() {
        std::os::unix::fs::chown(path, uid, gid).map_err(|e| {
            PidLockError::io(
                format!("failed to change ownership of '{}'", path.display()),
                e,
            )
        })?;
    }

    if metadata.mode() & STICKY_BIT != 0 {
        warn!(
            "Lock directory '{}' has the sticky bit set; locks left by other users cannot be recovered",
            path.display()
        );
    }

    Ok(())
}
