//! pidfilelock: mutual exclusion between processes through a PID file.
//!
//! The lock file holds the decimal PID of its owner and is guarded by
//! `flock(2)` advisory locks, which the kernel drops when the owner dies. A
//! file left behind by a crashed owner therefore never blocks a new one, and
//! readers can safely ask who holds the lock and whether it is still alive.
//!
//! ```no_run
//! use pidfilelock::locks::{ExclusiveGuard, PidFile, PidLock};
//!
//! let guard = ExclusiveGuard::acquire(PidLock::new("/run/lock/app.pid"), true)?;
//!
//! let mut file = PidFile::new("/run/lock/app.pid");
//! assert_eq!(file.pid()?, Some(std::process::id()));
//!
//! guard.release()?;
//! # Ok::<(), pidfilelock::error::PidLockError>(())
//! ```

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod identity;
pub mod locks;
pub mod process;
