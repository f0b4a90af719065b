//! Loop phase for free time mode
//!
//! Without tempo sync the loop is simply the display window: the phase is the
//! position of the write head inside the current window-length cycle.

use crate::types::positive_fraction;

use super::{ClockOutput, HostTransport};

/// Phase generator for a fixed-length loop measured in samples
#[derive(Debug, Clone, Default)]
pub struct FreeRunClock {
    /// Window length of the previous block (0 before the first block)
    window_samples: u64,
}

impl FreeRunClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next block starts a new cycle (and suggests a reset)
    pub fn reset(&mut self) {
        self.window_samples = 0;
    }

    /// Phase at `block_end` for a loop of `window_samples` samples
    pub fn process(
        &mut self,
        block_end: u64,
        window_samples: u64,
        transport: &HostTransport,
        tempo_bpm: f64,
    ) -> ClockOutput {
        let window = window_samples.max(1);
        let reset = self.window_samples != window;
        self.window_samples = window;

        ClockOutput {
            phase: positive_fraction((block_end % window) as f64 / window as f64),
            phase_reliable: true,
            reset_suggested: reset,
            tempo_bpm,
            tempo_reliable: transport.valid_tempo().is_some(),
            is_playing: transport.is_playing(),
            phase_per_sample: 1.0 / window as f64,
        }
    }
}
