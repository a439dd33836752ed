//! Process liveness and identity of the current process.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::{Pid, geteuid};

/// Check whether a process with the given PID is running.
///
/// Probes the PID with signal 0. A process we are not permitted to signal
/// still exists, so `EPERM` counts as running. PIDs that `kill(2)` would
/// interpret as a process group (zero or negative) are never running.
pub fn pid_is_running(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }

    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// PID of the current process.
pub fn current_pid() -> u32 {
    std::process::id()
}

/// Effective user ID of the current process.
///
/// Files we create are owned by this UID, so it is what a lock file's owner
/// is compared against.
pub fn effective_uid() -> u32 {
    geteuid().as_raw()
}
