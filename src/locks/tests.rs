//! Tests for the locking protocol within a single process.
//!
//! Separate handles open separate file descriptions, so the kernel treats
//! them like separate processes as far as `flock` is concerned.

use super::exclusive::Verdict;
use super::*;
use crate::error::PidLockError;
use crate::fs::{FlockMode, LockDirOptions, flock, mklockdir};
use crate::identity::IdSpec;
use crate::process::current_pid;
use nix::sys::pthread::{Pthread, pthread_kill, pthread_self};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use nix::sys::stat::{Mode, umask};
use nix::unistd::{Gid, getegid, getgroups};
use serial_test::serial;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::PathBuf;
use std::process::Command;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn lock_path() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lock");
    (temp_dir, path)
}

/// PID of a process that has already exited and been reaped.
fn dead_pid() -> u32 {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

fn is_root() -> bool {
    crate::process::effective_uid() == 0
}

extern "C" fn ignore_signal(_: libc::c_int) {}

/// Make SIGUSR1 interrupt blocking system calls instead of restarting them.
fn install_interrupting_handler() {
    let action = SigAction::new(
        SigHandler::Handler(ignore_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler does nothing, so it is async-signal-safe.
    unsafe { sigaction(Signal::SIGUSR1, &action) }.unwrap();
}

/// Run `f` on a new thread that can be signalled directly.
fn spawn_signallable<T, F>(f: F) -> (thread::JoinHandle<T>, Pthread)
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        tx.send(pthread_self()).unwrap();
        f()
    });
    (handle, rx.recv().unwrap())
}

fn finishes_soon<T>(handle: &thread::JoinHandle<T>) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    handle.is_finished()
}

fn is_interrupted(err: &PidLockError) -> bool {
    matches!(err, PidLockError::Io { source, .. } if source.kind() == io::ErrorKind::Interrupted)
}

#[test]
fn test_two_locks_exclude_each_other() {
    let (_temp_dir, path) = lock_path();
    let mut lock1 = PidLock::new(&path);
    let mut lock2 = PidLock::new(&path);

    assert!(lock1.acquire(false).unwrap());
    assert!(!lock2.acquire(false).unwrap());
    lock1.release(false).unwrap();
    assert!(lock2.acquire(false).unwrap());
    assert!(!lock1.acquire(false).unwrap());
    lock2.release(false).unwrap();

    assert!(!path.exists());
}

#[test]
fn test_observer_reads_holder_pid() {
    let (_temp_dir, path) = lock_path();
    let mut lock = PidLock::new(&path);
    let mut file = PidFile::new(&path);

    assert!(lock.acquire(true).unwrap());
    assert!(file.acquire().unwrap());
    assert_eq!(file.pid().unwrap(), Some(current_pid()));
    assert_eq!(lock.pid().unwrap(), Some(current_pid()));
    file.release().unwrap();
    lock.release(false).unwrap();

    assert!(!file.acquire().unwrap());
    assert!(!path.exists());
}

#[test]
fn test_guards_release_on_scope_exit() {
    let (_temp_dir, path) = lock_path();

    {
        let guard = ExclusiveGuard::acquire(PidLock::new(&path), false).unwrap();
        assert!(guard.lock().is_locked());
        assert_eq!(guard.path(), path.as_path());

        let mut file = PidFile::open_locked(&path).unwrap().unwrap();
        assert!(file.is_locked());
        assert_eq!(file.pid().unwrap(), Some(current_pid()));
    }

    assert!(!path.exists());
}

#[test]
fn test_explicit_guard_release() {
    let (_temp_dir, path) = lock_path();

    let guard = ExclusiveGuard::try_acquire(PidLock::new(&path), true)
        .unwrap()
        .unwrap();
    assert!(ExclusiveGuard::try_acquire(PidLock::new(&path), true)
        .unwrap()
        .is_none());
    guard.release().unwrap();

    assert!(!path.exists());
}

#[test]
fn test_is_running_follows_holder() {
    let (_temp_dir, path) = lock_path();
    let mut lock = PidLock::new(&path);
    let mut file = PidFile::new(&path);

    assert!(!file.is_running().unwrap());
    lock.acquire(true).unwrap();
    assert!(file.is_running().unwrap());
    assert!(!file.is_locked());
    lock.release(false).unwrap();
    assert!(!file.is_running().unwrap());
}

#[test]
fn test_opportunistic_lock_falls_back_to_observer() {
    let (_temp_dir, path) = lock_path();
    let options = LockOptions::default();

    {
        let mut outer = opportunistic_lock(&path, &options, false).unwrap();
        assert!(outer.is_holder());

        let mut inner = opportunistic_lock(&path, &options, false).unwrap();
        assert!(!inner.is_holder());
        assert_eq!(inner.pid().unwrap(), Some(current_pid()));
        assert_eq!(outer.pid().unwrap(), Some(current_pid()));
    }
    assert!(!path.exists());

    let again = opportunistic_lock(&path, &options, true).unwrap();
    assert!(again.is_holder());
}

#[test]
fn test_opportunistic_lock_takes_over_dead_residue() {
    let (_temp_dir, path) = lock_path();
    fs::write(&path, dead_pid().to_string()).unwrap();

    let mut role = opportunistic_lock(&path, &LockOptions::default(), false).unwrap();

    assert!(role.is_holder());
    assert_eq!(role.pid().unwrap(), Some(current_pid()));
}

#[test]
fn test_lock_in_provisioned_directory() {
    let temp_dir = TempDir::new().unwrap();
    let lock_dir = temp_dir.path().join("dir").join("subdir");
    assert!(!lock_dir.exists());

    let options = LockDirOptions {
        parents: true,
        ..Default::default()
    };
    mklockdir(&lock_dir, &options).unwrap();
    assert!(lock_dir.exists());

    let path = lock_dir.join("lock");
    {
        let _guard = ExclusiveGuard::acquire(PidLock::new(&path), false).unwrap();
        assert!(path.exists());
    }
    assert!(!path.exists());

    fs::remove_dir(&lock_dir).unwrap();
    fs::remove_dir(lock_dir.parent().unwrap()).unwrap();
}

#[test]
fn test_double_acquire_is_rejected() {
    let (_temp_dir, path) = lock_path();
    let mut lock = PidLock::new(&path);
    let mut file = PidFile::new(&path);

    lock.acquire(true).unwrap();
    assert!(matches!(
        lock.acquire(false),
        Err(PidLockError::AlreadyLocked(_))
    ));

    file.acquire().unwrap();
    assert!(matches!(file.acquire(), Err(PidLockError::AlreadyLocked(_))));
}

#[test]
fn test_release_without_lock_is_rejected() {
    let (_temp_dir, path) = lock_path();

    assert!(matches!(
        PidLock::new(&path).release(false),
        Err(PidLockError::NotLocked(_))
    ));
    assert!(matches!(
        PidLock::new(&path).pid(),
        Err(PidLockError::NotLocked(_))
    ));
    assert!(matches!(
        PidFile::new(&path).release(),
        Err(PidLockError::NotLocked(_))
    ));
}

#[test]
fn test_dropping_held_lock_releases_it() {
    let (_temp_dir, path) = lock_path();

    let mut lock = PidLock::new(&path);
    lock.acquire(true).unwrap();
    assert!(path.exists());
    drop(lock);

    assert!(!path.exists());
    assert!(PidLock::new(&path).acquire(false).unwrap());
}

#[test]
fn test_release_tolerates_missing_file() {
    let (_temp_dir, path) = lock_path();
    let mut lock = PidLock::new(&path);

    lock.acquire(true).unwrap();
    fs::remove_file(&path).unwrap();
    lock.release(true).unwrap();

    assert!(!lock.is_locked());
}

#[test]
fn test_dead_owner_residue_is_taken_over() {
    let (_temp_dir, path) = lock_path();
    fs::write(&path, dead_pid().to_string()).unwrap();

    let mut lock = PidLock::new(&path);
    assert!(lock.acquire(false).unwrap());

    assert_eq!(fs::read_to_string(&path).unwrap(), current_pid().to_string());
}

#[test]
fn test_empty_and_garbage_residue_is_taken_over() {
    for residue in ["", "not a pid", "99999999999999999999"] {
        let (_temp_dir, path) = lock_path();
        fs::write(&path, residue).unwrap();

        let mut lock = PidLock::new(&path);
        assert!(lock.acquire(false).unwrap(), "residue {:?}", residue);
        assert_eq!(fs::read_to_string(&path).unwrap(), current_pid().to_string());
        lock.release(false).unwrap();
    }
}

#[test]
fn test_longer_residue_is_truncated() {
    let (_temp_dir, path) = lock_path();
    fs::write(&path, format!("{}0000000000", dead_pid())).unwrap();

    let mut lock = PidLock::new(&path);
    lock.acquire(true).unwrap();

    assert_eq!(lock.pid().unwrap(), Some(current_pid()));
}

#[test]
fn test_verify_detects_replaced_file() {
    let (_temp_dir, path) = lock_path();
    fs::write(&path, "").unwrap();
    let stale = File::open(&path).unwrap();
    let lock = PidLock::new(&path);

    fs::remove_file(&path).unwrap();
    assert_eq!(lock.verify(&stale).unwrap(), Verdict::Replaced);

    fs::write(&path, "").unwrap();
    assert_eq!(lock.verify(&stale).unwrap(), Verdict::Replaced);
}

#[test]
fn test_verify_detects_live_owner() {
    let (_temp_dir, path) = lock_path();
    fs::write(&path, current_pid().to_string()).unwrap();
    let file = File::open(&path).unwrap();

    let verdict = PidLock::new(&path).verify(&file).unwrap();

    assert_eq!(verdict, Verdict::OwnerAlive(current_pid()));
}

#[test]
fn test_verify_accepts_dead_residue() {
    let (_temp_dir, path) = lock_path();
    fs::write(&path, dead_pid().to_string()).unwrap();
    let file = File::open(&path).unwrap();

    let verdict = PidLock::new(&path).verify(&file).unwrap();

    assert_eq!(verdict, Verdict::Legitimate);
}

#[test]
fn test_foreign_residue_is_replaced() {
    if !is_root() {
        // Only root can create a file owned by another user.
        return;
    }
    let (_temp_dir, path) = lock_path();
    fs::write(&path, dead_pid().to_string()).unwrap();
    std::os::unix::fs::chown(&path, Some(65534), None).unwrap();
    let foreign_ino = fs::metadata(&path).unwrap().ino();

    let file = File::open(&path).unwrap();
    assert_eq!(
        PidLock::new(&path).verify(&file).unwrap(),
        Verdict::ForeignOwner(65534)
    );

    let mut lock = PidLock::new(&path);
    assert!(lock.acquire(false).unwrap());
    let metadata = fs::metadata(&path).unwrap();
    assert_eq!(metadata.uid(), 0);
    assert_ne!(metadata.ino(), foreign_ino);
}

#[test]
fn test_unwritable_lock_file_is_permission_error() {
    if is_root() {
        // Root bypasses file permissions.
        return;
    }
    let (_temp_dir, path) = lock_path();
    fs::write(&path, "").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

    let mut lock = PidLock::new(&path);
    assert!(matches!(
        lock.acquire(false),
        Err(PidLockError::PermissionDenied { .. })
    ));

    let options = LockOptions {
        unsafe_cleanup: true,
        ..Default::default()
    };
    let mut lock = PidLock::with_options(&path, &options).unwrap();
    assert!(matches!(
        lock.acquire(true),
        Err(PidLockError::UnsafeCleanupUnsupported(_))
    ));
    assert!(path.exists());
}

#[test]
fn test_blocking_acquire_waits_for_release() {
    let (_temp_dir, path) = lock_path();
    let mut lock1 = PidLock::new(&path);
    lock1.acquire(true).unwrap();

    let waiter_path = path.clone();
    let waiter = thread::spawn(move || {
        let mut lock2 = PidLock::new(waiter_path);
        assert!(lock2.acquire(true).unwrap());
        lock2
    });

    thread::sleep(Duration::from_millis(200));
    assert!(!waiter.is_finished());
    lock1.release(false).unwrap();

    let lock2 = waiter.join().unwrap();
    assert!(lock2.is_locked());
    assert_eq!(lock2.pid().unwrap(), Some(current_pid()));
    assert!(path.exists());
}

#[test]
fn test_drain_release_waits_for_observers() {
    let (_temp_dir, path) = lock_path();
    let mut lock = PidLock::new(&path);
    lock.acquire(true).unwrap();
    let mut file = PidFile::open_locked(&path).unwrap().unwrap();

    let releaser = thread::spawn(move || {
        lock.release(true).unwrap();
        lock
    });

    thread::sleep(Duration::from_millis(200));
    assert!(!releaser.is_finished());
    assert!(path.exists());
    assert_eq!(file.pid().unwrap(), Some(current_pid()));

    file.release().unwrap();
    let lock = releaser.join().unwrap();
    assert!(!lock.is_locked());
    assert!(!path.exists());
}

#[test]
fn test_release_without_drain_ignores_observers() {
    let (_temp_dir, path) = lock_path();
    let mut lock = PidLock::new(&path);
    lock.acquire(true).unwrap();
    let mut file = PidFile::open_locked(&path).unwrap().unwrap();

    lock.release(false).unwrap();

    assert!(!path.exists());
    // The observer still reads the unlinked file it has open.
    assert_eq!(file.pid().unwrap(), Some(current_pid()));
}

#[test]
#[serial]
fn test_interrupted_drain_keeps_lock() {
    install_interrupting_handler();
    let (_temp_dir, path) = lock_path();
    let mut lock = PidLock::new(&path);
    lock.acquire(true).unwrap();
    let mut file = PidFile::open_locked(&path).unwrap().unwrap();

    let (releaser, thread_id) = spawn_signallable(move || {
        let result = lock.release(true);
        (lock, result)
    });
    thread::sleep(Duration::from_millis(200));
    assert!(!releaser.is_finished());

    pthread_kill(thread_id, Signal::SIGUSR1).unwrap();
    assert!(finishes_soon(&releaser));

    let (mut lock, result) = releaser.join().unwrap();
    assert!(is_interrupted(&result.unwrap_err()));
    assert!(lock.is_locked());
    assert!(path.exists());

    // With the observer gone, only our restored read lock is left on the file.
    file.release().unwrap();
    let other = File::open(&path).unwrap();
    assert!(!flock(&other, FlockMode::Exclusive, false).unwrap());

    lock.release(true).unwrap();
    assert!(!path.exists());
}

#[test]
#[serial]
fn test_interrupted_guard_release_returns_promptly() {
    install_interrupting_handler();
    let (_temp_dir, path) = lock_path();
    let guard = ExclusiveGuard::acquire(PidLock::new(&path), true).unwrap();
    let file = PidFile::open_locked(&path).unwrap().unwrap();

    let (releaser, thread_id) = spawn_signallable(move || guard.release());
    thread::sleep(Duration::from_millis(200));
    assert!(!releaser.is_finished());

    pthread_kill(thread_id, Signal::SIGUSR1).unwrap();
    assert!(finishes_soon(&releaser));

    let err = releaser.join().unwrap().unwrap_err();
    assert!(is_interrupted(&err));
    // Abandoning the drain still gives up the lock.
    assert!(!path.exists());
    assert!(file.is_locked());
}

#[test]
fn test_residue_naming_unrelated_live_process() {
    let (_temp_dir, path) = lock_path();
    // PID 1 is always running and never holds our lock.
    fs::write(&path, "1").unwrap();

    let started = Instant::now();
    let mut lock = PidLock::new(&path);
    assert!(!lock.acquire(false).unwrap());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!lock.is_locked());
    assert_eq!(fs::read_to_string(&path).unwrap(), "1");

    let role = opportunistic_lock(&path, &LockOptions::default(), false).unwrap();
    assert!(!role.is_holder());
}

#[test]
fn test_observer_on_residue_blocks_non_blocking_acquire() {
    let (_temp_dir, path) = lock_path();
    fs::write(&path, dead_pid().to_string()).unwrap();

    let mut file = PidFile::open_locked(&path).unwrap().unwrap();
    assert!(!file.is_running().unwrap());
    assert!(!PidLock::new(&path).acquire(false).unwrap());

    file.release().unwrap();
    assert!(PidLock::new(&path).acquire(false).unwrap());
}

#[test]
fn test_observer_pid_edge_cases() {
    let (_temp_dir, path) = lock_path();
    let mut file = PidFile::new(&path);

    assert_eq!(file.pid().unwrap(), None);

    fs::write(&path, "").unwrap();
    assert_eq!(file.pid().unwrap(), None);
    assert!(!file.is_running().unwrap());

    fs::write(&path, "garbage").unwrap();
    assert!(matches!(file.pid(), Err(PidLockError::InvalidPid { .. })));
    assert!(!file.is_locked());
}

#[test]
fn test_configured_group_is_applied() {
    let (temp_dir, path) = lock_path();
    let gid = fs::metadata(temp_dir.path()).unwrap().gid();

    let options = LockOptions {
        group: Some(IdSpec::Id(gid)),
        ..Default::default()
    };
    let mut lock = PidLock::with_options(&path, &options).unwrap();
    lock.acquire(true).unwrap();

    assert_eq!(fs::metadata(&path).unwrap().gid(), gid);
}

#[test]
fn test_failed_claim_removes_lock_file() {
    if is_root() {
        return;
    }
    let (_temp_dir, path) = lock_path();
    let own = getgroups().unwrap();
    let egid = getegid();
    let foreign = (1..65534)
        .map(Gid::from_raw)
        .find(|gid| *gid != egid && !own.contains(gid))
        .unwrap();

    let options = LockOptions {
        group: Some(IdSpec::Id(foreign.as_raw())),
        ..Default::default()
    };
    let mut lock = PidLock::with_options(&path, &options).unwrap();
    let err = lock.acquire(true).unwrap_err();

    assert!(matches!(err, PidLockError::Io { .. }));
    assert!(!lock.is_locked());
    assert!(!path.exists());
}

#[test]
fn test_unknown_group_fails_before_touching_disk() {
    let (_temp_dir, path) = lock_path();
    let options = LockOptions {
        group: Some(IdSpec::Name("pidfilelock-no-such-group".to_string())),
        ..Default::default()
    };

    assert!(matches!(
        PidLock::with_options(&path, &options),
        Err(PidLockError::UnknownGroup(_))
    ));
    assert!(!path.exists());
}

#[test]
#[serial]
fn test_lock_file_gets_configured_mode() {
    let (_temp_dir, path) = lock_path();
    let options = LockOptions {
        mode: 0o640,
        ..Default::default()
    };

    let previous = umask(Mode::empty());
    let mut lock = PidLock::with_options(&path, &options).unwrap();
    let acquired = lock.acquire(true);
    umask(previous);

    assert!(acquired.unwrap());
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o7777, 0o640);
}
