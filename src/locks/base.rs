//! State and file access shared by both lock roles.

use std::fs::{File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Path plus the descriptor that proves we hold a lock on it.
///
/// A present descriptor means the lock is held from this handle's point of
/// view; dropping the descriptor releases the advisory lock.
#[derive(Debug)]
pub(super) struct PidHandle {
    path: PathBuf,
    file: Option<File>,
}

impl PidHandle {
    pub(super) fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    pub(super) fn is_locked(&self) -> bool {
        self.file.is_some()
    }

    pub(super) fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub(super) fn hold(&mut self, file: File) {
        debug_assert!(self.file.is_none());
        self.file = Some(file);
    }

    pub(super) fn take(&mut self) -> Option<File> {
        self.file.take()
    }
}

/// What a lock file says about its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum PidContent {
    /// Nothing written yet; the owner is unknown. Never PID 0.
    Empty,
    Pid(u32),
    Invalid(String),
}

impl PidContent {
    pub(super) fn parse(content: &str) -> Self {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return PidContent::Empty;
        }
        match trimmed.parse::<u32>() {
            Ok(pid) => PidContent::Pid(pid),
            Err(_) => PidContent::Invalid(content.to_string()),
        }
    }

    /// Read the whole file from the start, regardless of the current offset.
    pub(super) fn read(mut file: &File) -> io::Result<Self> {
        file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Self::parse(&String::from_utf8_lossy(&buf)))
    }
}

/// Whether `path` still names the file behind `opened`.
///
/// A missing path counts as a different file: the one we opened was unlinked.
pub(super) fn still_linked(opened: &Metadata, path: &Path) -> io::Result<bool> {
    match std::fs::metadata(path) {
        Ok(current) => Ok(current.dev() == opened.dev() && current.ino() == opened.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
