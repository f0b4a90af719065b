//! Configuration for the analysis bridge and the apps built on it
//!
//! ```ignore
//! use loopscope_core::config::{default_config_path, load_config, BridgeConfig};
//!
//! let config: BridgeConfig = load_config(&default_config_path("bridge.yaml"));
//! ```

mod bridge;
mod io;
mod paths;

pub use bridge::BridgeConfig;
pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};
