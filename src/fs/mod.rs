//! Filesystem primitives for pidfilelock.
//!
//! Advisory locking on descriptors and provisioning of lock directories.

pub mod flock;
mod lockdir;

pub use flock::{FlockMode, flock};
pub use lockdir::{DEFAULT_LOCK_DIR_MODE, LockDirOptions, mklockdir};
