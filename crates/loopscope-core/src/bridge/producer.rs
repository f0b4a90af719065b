//! Audio-thread half of the bridge

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::clock::{ClockInput, FreeRunClock, HostTransport, TransportClock};
use crate::error::{ConfigError, ConfigResult};
use crate::history::HistoryLayout;
use crate::timing::TimeMode;
use crate::types::AudioBlock;

use super::frame::{FrameSnapshot, RawFrame};
use super::BridgeShared;

/// Writes history and publishes snapshots from the audio callback
///
/// There is exactly one producer per bridge and it is not `Clone`.
/// [`on_audio_block`](Self::on_audio_block) is real-time safe: it never
/// blocks, locks, allocates or logs. `configure` and `release` belong to
/// pipeline setup and teardown.
pub struct Producer {
    shared: Arc<BridgeShared>,
    clock: TransportClock,
    free_clock: FreeRunClock,
    sample_rate: f64,
    configured: bool,
    /// Frames written since the last configure/release
    written: u64,
    reset_epoch: u32,
    last_mode: Option<TimeMode>,
}

impl Producer {
    pub(super) fn new(shared: Arc<BridgeShared>) -> Self {
        let clock = TransportClock::new(shared.config.clock);
        Self {
            shared,
            clock,
            free_clock: FreeRunClock::new(),
            sample_rate: 0.0,
            configured: false,
            written: 0,
            reset_epoch: 0,
            last_mode: None,
        }
    }

    /// Prepare for a stream at `sample_rate`
    ///
    /// Resets the history and clock. The previous snapshot is withdrawn, so
    /// consumers report "not published" until the first block arrives.
    pub fn configure(&mut self, sample_rate: f64, block_size_hint: usize) -> ConfigResult<HistoryLayout> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }

        let layout = self.shared.config.layout_for(sample_rate);
        if let Err(e) = self.shared.history.configure(layout) {
            log::warn!("Bridge configure at {} Hz rejected: {}", sample_rate, e);
            return Err(e);
        }
        if block_size_hint > layout.capacity {
            log::warn!(
                "Block size hint {} exceeds history capacity {}; only block tails are kept",
                block_size_hint,
                layout.capacity
            );
        }

        self.shared.set_sample_rate(sample_rate);
        self.shared.frame.write(&RawFrame::default());
        self.sample_rate = sample_rate;
        self.configured = true;
        self.written = 0;
        self.last_mode = None;
        self.clock.reset();
        self.free_clock.reset();

        log::info!(
            "Bridge configured: {} Hz, {} ch x {} frames ({:.2} s), block hint {}",
            sample_rate,
            layout.channels,
            layout.capacity,
            layout.capacity as f64 / sample_rate,
            block_size_hint
        );
        Ok(layout)
    }

    /// Pipeline stopped: drop history, reset the clock and publish a stopped
    /// snapshot that suggests a reset
    pub fn release(&mut self) {
        self.shared.history.clear();
        self.clock.reset();
        self.free_clock.reset();
        self.written = 0;
        self.last_mode = None;
        self.reset_epoch = self.reset_epoch.wrapping_add(1);

        let snapshot = FrameSnapshot {
            tempo_bpm: self.clock.state().last_tempo_bpm(),
            sample_rate: self.sample_rate,
            reset_suggested: true,
            reset_epoch: self.reset_epoch,
            ..FrameSnapshot::default()
        };
        self.shared.frame.write(&snapshot.to_raw());
        log::debug!("Bridge released");
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Absorb one audio block and publish its snapshot (real-time safe)
    ///
    /// Samples are written before the snapshot is published, so a published
    /// `history_end` is never ahead of the history.
    pub fn on_audio_block(&mut self, block: &AudioBlock<'_>, transport: &HostTransport) {
        if !self.configured {
            return;
        }

        let frames = block.frames();
        let block_start = self.written;
        let block_end = block_start + frames as u64;
        self.shared.history.write(block);
        self.written = block_end;

        let mode = self.shared.time_mode.load();
        let resolved = mode.resolve(transport.valid_tempo(), self.clock.state().last_tempo_bpm());
        let switched = self.last_mode.is_some_and(|last| last.is_sync() != mode.is_sync());
        self.last_mode = Some(mode);

        let out = if mode.is_sync() {
            if switched {
                self.clock.restart();
            }
            self.clock.process(&ClockInput {
                transport: *transport,
                block_start,
                block_len: frames,
                sample_rate: self.sample_rate,
                beats_in_loop: resolved.beats,
            })
        } else {
            if switched {
                self.free_clock.reset();
            }
            let window = resolved.samples(self.sample_rate) as u64;
            self.free_clock
                .process(block_end, window, transport, resolved.tempo_used)
        };

        if out.reset_suggested {
            self.reset_epoch = self.reset_epoch.wrapping_add(1);
        }

        let snapshot = FrameSnapshot {
            history_end: block_end,
            phase: out.phase,
            phase_reliable: out.phase_reliable,
            reset_suggested: out.reset_suggested,
            tempo_bpm: out.tempo_bpm,
            tempo_reliable: out.tempo_reliable,
            is_playing: out.is_playing,
            transport_seconds: transport.valid_seconds(),
            phase_per_sample: out.phase_per_sample,
            sample_rate: self.sample_rate,
            beats_in_loop: resolved.beats,
            reset_epoch: self.reset_epoch,
        };
        self.shared.frame.write(&snapshot.to_raw());
    }

    /// Frames written since the last configure/release
    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl BridgeShared {
    pub(super) fn set_sample_rate(&self, sample_rate: f64) {
        self.sample_rate.store(sample_rate.to_bits(), Ordering::Relaxed);
    }
}
