//! Config loading, validation, and conversion into lock options.

use super::model::Config;
use crate::error::{PidLockError, Result};
use crate::locks::LockOptions;
use std::path::Path;

/// Bits a mode may carry: permissions plus setuid, setgid and sticky.
const MODE_MASK: u32 = 0o7777;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the config file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(PidLockError::UserError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            PidLockError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| PidLockError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            PidLockError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - modes must fit in `0o7777`
    /// - `mode` must let the owner read and write, or a later holder of the
    ///   same user could not reopen the file
    /// - `lock_dir_mode` must let the owner create files in the directory
    pub fn validate(&self) -> Result<()> {
        for (name, mode) in [("mode", self.mode), ("lock_dir_mode", self.lock_dir_mode)] {
            if mode.bits() & !MODE_MASK != 0 {
                return Err(PidLockError::UserError(format!(
                    "config validation failed: {} {} has bits outside 7777",
                    name, mode
                )));
            }
        }

        if self.mode.bits() & 0o600 != 0o600 {
            return Err(PidLockError::UserError(format!(
                "config validation failed: mode {} must allow the owner to read and write",
                self.mode
            )));
        }

        if self.lock_dir_mode.bits() & 0o300 != 0o300 {
            return Err(PidLockError::UserError(format!(
                "config validation failed: lock_dir_mode {} must allow the owner to write and search",
                self.lock_dir_mode
            )));
        }

        Ok(())
    }

    /// Options for an exclusive lock handle.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            mode: self.mode.bits(),
            group: self.group.clone(),
            unsafe_cleanup: self.unsafe_cleanup,
        }
    }
}
