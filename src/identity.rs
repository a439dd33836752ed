//! User and group identities given either by name or by numeric ID.
//!
//! Names are resolved through the system user/group database.

use crate::error::{PidLockError, Result};
use nix::unistd::{Group, User};
use serde::{Deserialize, Serialize};
use std::io;
use std::str::FromStr;

/// A user or group given by name or numeric ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdSpec {
    Id(u32),
    Name(String),
}

impl FromStr for IdSpec {
    type Err = PidLockError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PidLockError::UserError(
                "user or group must not be empty".to_string(),
            ));
        }
        Ok(match s.parse::<u32>() {
            Ok(id) => IdSpec::Id(id),
            Err(_) => IdSpec::Name(s.to_string()),
        })
    }
}

/// Resolve a user to its UID.
pub fn resolve_user(spec: &IdSpec) -> Result<u32> {
    match spec {
        IdSpec::Id(uid) => Ok(*uid),
        IdSpec::Name(name) => User::from_name(name)
            .map_err(|e| {
                PidLockError::io(format!("failed to look up user '{}'", name), io::Error::from(e))
            })?
            .map(|user| user.uid.as_raw())
            .ok_or_else(|| PidLockError::UnknownUser(name.clone())),
    }
}

/// Resolve a group to its GID.
pub fn resolve_group(spec: &IdSpec) -> Result<u32> {
    match spec {
        IdSpec::Id(gid) => Ok(*gid),
        IdSpec::Name(name) => Group::from_name(name)
            .map_err(|e| {
                PidLockError::io(format!("failed to look up group '{}'", name), io::Error::from(e))
            })?
            .map(|group| group.gid.as_raw())
            .ok_or_else(|| PidLockError::UnknownGroup(name.clone())),
    }
}
