//! Standard locations for Loopscope configuration files

use std::path::PathBuf;

/// Directory holding Loopscope configuration
///
/// Returns: `<config dir>/loopscope` (e.g. `~/.config/loopscope` on Linux),
/// falling back to the working directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loopscope")
}

/// Default path for a config file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
