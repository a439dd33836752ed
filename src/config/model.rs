//! Config struct definition and default implementation.

use super::types::*;
use crate::identity::IdSpec;
use serde::{Deserialize, Serialize};

/// Configuration for pidfilelock.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
/// Command line flags override whatever is set here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock file settings
    // =========================================================================
    /// Mode for newly created lock files.
    #[serde(default = "default_mode")]
    pub mode: FileMode,

    /// Group given to lock files, by name or GID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<IdSpec>,

    /// Forcibly remove lock files we cannot write to (not implemented; fails
    /// acquisition with an explicit error).
    #[serde(default)]
    pub unsafe_cleanup: bool,

    /// Wait for observers to let go before removing the lock file.
    #[serde(default)]
    pub drain_on_release: bool,

    // =========================================================================
    // Lock directory settings
    // =========================================================================
    /// Mode for directories created by `mkdir`.
    #[serde(default = "default_lock_dir_mode")]
    pub lock_dir_mode: FileMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            group: None,
            unsafe_cleanup: false,
            drain_on_release: false,
            lock_dir_mode: default_lock_dir_mode(),
        }
    }
}
