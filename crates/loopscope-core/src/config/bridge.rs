//! Analysis bridge configuration
//!
//! Sizes the sample history and tunes the reader retry budget and the loop
//! clock. Read once when the bridge is built; the audio thread never sees it.

use serde::{Deserialize, Serialize};

use crate::clock::ClockTuning;
use crate::history::{HistoryLayout, DEFAULT_HISTORY_SECONDS};
use crate::sync::{RetryBudget, DEFAULT_READ_ATTEMPTS};
use crate::types::MAX_CHANNELS;

/// Analysis bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Channels kept in the history (1 or 2)
    /// Default: 2
    pub channels: usize,

    /// Seconds of audio kept in the history
    /// The frame count is clamped to 65 536..=2 097 152 per channel.
    /// Default: 9.0
    pub history_seconds: f64,

    /// Highest sample rate the history is allocated for
    /// Storage is allocated once at this rate so reconfiguring never
    /// reallocates. Configuring above it fails.
    /// Default: 192000
    pub max_sample_rate: f64,

    /// Attempts a reader makes before reporting contention
    /// Default: 16
    pub read_attempts: u32,

    /// Loop clock thresholds
    pub clock: ClockTuning,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channels: MAX_CHANNELS,
            history_seconds: DEFAULT_HISTORY_SECONDS,
            max_sample_rate: 192_000.0,
            read_attempts: DEFAULT_READ_ATTEMPTS,
            clock: ClockTuning::default(),
        }
    }
}

impl BridgeConfig {
    /// Channel count clamped to what the history supports
    pub fn channel_count(&self) -> usize {
        self.channels.clamp(1, MAX_CHANNELS)
    }

    pub fn retry_budget(&self) -> RetryBudget {
        RetryBudget::new(self.read_attempts)
    }

    /// Storage to allocate up front
    pub fn allocation(&self) -> HistoryLayout {
        HistoryLayout::for_sample_rate(self.channel_count(), self.max_sample_rate, self.history_seconds)
    }

    /// Layout used when running at `sample_rate`
    pub fn layout_for(&self, sample_rate: f64) -> HistoryLayout {
        HistoryLayout::for_sample_rate(self.channel_count(), sample_rate, self.history_seconds)
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_history_seconds(mut self, seconds: f64) -> Self {
        self.history_seconds = seconds;
        self
    }

    pub fn with_max_sample_rate(mut self, sample_rate: f64) -> Self {
        self.max_sample_rate = sample_rate;
        self
    }

    pub fn with_read_attempts(mut self, attempts: u32) -> Self {
        self.read_attempts = attempts;
        self
    }
}
