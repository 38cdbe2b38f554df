// src/config/loader.rs

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RolloutError};

/// Load a configuration file and return the raw, unvalidated model.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to
/// also check required keys and value ranges.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RolloutError::ConfigMissing(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Reports absent required keys as `ConfigMissing`.
/// - Checks ranges, the health endpoint URL and the watch globs.
///
/// Relative paths are still relative; see [`ConfigFile::rooted_at`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}
