//! Configuration types and defaults for pidfilelock.

use crate::error::{PidLockError, Result};
use crate::fs::DEFAULT_LOCK_DIR_MODE;
use crate::locks::DEFAULT_LOCK_MODE;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Permission bits for a lock file or directory.
///
/// Written in configs and on the command line as an octal string (`"664"`,
/// `"0o664"`, `"0664"`). A bare YAML integer is taken as the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode(pub u32);

impl FileMode {
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl FromStr for FileMode {
    type Err = PidLockError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
        u32::from_str_radix(digits, 8)
            .map(FileMode)
            .map_err(|_| PidLockError::UserError(format!("invalid octal mode '{}'", s)))
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

impl Serialize for FileMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FileMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bits(u32),
            Octal(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bits(bits) => Ok(FileMode(bits)),
            Repr::Octal(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

// Default value functions for serde
pub(crate) fn default_mode() -> FileMode {
    FileMode(DEFAULT_LOCK_MODE)
}
pub(crate) fn default_lock_dir_mode() -> FileMode {
    FileMode(DEFAULT_LOCK_DIR_MODE)
}
