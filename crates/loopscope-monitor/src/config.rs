//! Monitor configuration
//!
//! Stored as YAML in the user's config directory.
//! Default location: ~/.config/loopscope/monitor.yaml

use std::path::PathBuf;

use loopscope_core::config::{default_config_path, BridgeConfig};
use loopscope_core::{ChannelView, TimeMode};
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sample history and loop clock settings
    pub bridge: BridgeConfig,
    /// Audio input settings
    pub input: InputConfig,
    /// Strip rendering settings
    pub display: DisplayConfig,
}

/// Audio input section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Input device name (None = system default)
    pub device: Option<String>,
    /// Preferred sample rate (None = device default)
    pub sample_rate: Option<u32>,
    /// Tempo of the built-in transport. A live input has no host transport,
    /// so the monitor plays one at this tempo from the first captured sample.
    /// None = no transport (the loop clock runs at its fallback tempo).
    /// Default: 120.0
    pub tempo_bpm: Option<f64>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: None,
            tempo_bpm: Some(120.0),
        }
    }
}

/// Display section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Sync division or free duration of the displayed loop
    pub time_mode: TimeMode,
    /// Which signal the strip shows
    pub view: ChannelView,
    /// Strip refresh rate
    /// Default: 30 Hz
    pub refresh_hz: f64,
    /// Shift the display back to line up with delayed monitoring (ms)
    /// Default: 0
    pub delay_comp_ms: f64,
    /// Strip width in characters
    /// Default: 64
    pub columns: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_mode: TimeMode::default(),
            view: ChannelView::Mid,
            refresh_hz: 30.0,
            delay_comp_ms: 0.0,
            columns: 64,
        }
    }
}

impl DisplayConfig {
    /// Refresh period, limited to 1..=120 Hz
    pub fn refresh_period(&self) -> std::time::Duration {
        let hz = if self.refresh_hz.is_finite() {
            self.refresh_hz.clamp(1.0, 120.0)
        } else {
            30.0
        };
        std::time::Duration::from_secs_f64(1.0 / hz)
    }

    /// Delay compensation in samples at `sample_rate`
    pub fn delay_samples(&self, sample_rate: f64) -> u64 {
        let samples = (self.delay_comp_ms.max(0.0) * sample_rate / 1000.0).round();
        if samples.is_finite() {
            samples as u64
        } else {
            0
        }
    }
}

/// Default config file path
pub fn default_monitor_config_path() -> PathBuf {
    default_config_path("monitor.yaml")
}
