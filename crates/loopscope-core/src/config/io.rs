//! YAML configuration loading and saving

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read a YAML config, `Ok(None)` when the file does not exist
///
/// Unreadable or malformed files are errors carrying the path.
pub fn read_config<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read config {}", path.display())),
    };

    serde_yaml::from_str(&contents)
        .map(Some)
        .with_context(|| format!("Invalid config {}", path.display()))
}

/// Lenient [`read_config`]: any failure logs a warning and gives defaults
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match read_config(path) {
        Ok(Some(config)) => {
            log::info!("Config loaded from {}", path.display());
            config
        }
        Ok(None) => {
            log::debug!("No config at {}, using defaults", path.display());
            T::default()
        }
        Err(e) => {
            log::warn!("{:#}, using defaults", e);
            T::default()
        }
    }
}

/// Save configuration as YAML, creating parent directories
///
/// The file is written next to its destination and renamed into place, so a
/// reader never sees half a config.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    let staging = path.with_extension("yaml.partial");
    std::fs::write(&staging, yaml).with_context(|| format!("Failed to write {}", staging.display()))?;
    std::fs::rename(&staging, path).with_context(|| format!("Failed to replace {}", path.display()))?;

    log::info!("Config saved to {}", path.display());
    Ok(())
}
