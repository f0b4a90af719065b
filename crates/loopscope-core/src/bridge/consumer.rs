//! Render-thread half of the bridge

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::{FrameError, FrameResult, ReadResult};
use crate::history::SampleWindow;
use crate::timing::{ResolvedWindow, TimeMode};
use crate::types::{positive_fraction, DEFAULT_TEMPO_BPM};

use super::frame::{FrameSnapshot, RenderFrame};
use super::BridgeShared;

/// Reads snapshots and sample windows for rendering
///
/// Cheap to clone; each clone tracks its own reset epoch so every consumer
/// sees every reset once. Nothing here ever blocks the producer.
#[derive(Clone)]
pub struct Consumer {
    shared: Arc<BridgeShared>,
    last_epoch: Option<u32>,
}

impl Consumer {
    pub(super) fn new(shared: Arc<BridgeShared>) -> Self {
        Self {
            shared,
            last_epoch: None,
        }
    }

    /// Latest published snapshot (bounded retry)
    pub fn latest_snapshot(&self) -> FrameResult<FrameSnapshot> {
        let raw = self
            .shared
            .frame
            .read(self.shared.budget)
            .map_err(|e| FrameError::Contended { attempts: e.attempts })?;
        FrameSnapshot::from_raw(&raw).ok_or(FrameError::NotPublished)
    }

    /// Window of `requested_samples` ending `delay_samples` before the latest
    /// snapshot, with the phase rewound to match
    pub fn request_render_frame(&mut self, requested_samples: usize, delay_samples: u64) -> FrameResult<RenderFrame> {
        let mut frame = RenderFrame::default();
        self.render_frame_into(&mut frame, requested_samples, delay_samples)?;
        Ok(frame)
    }

    /// Same as [`request_render_frame`](Self::request_render_frame), reusing
    /// `frame`'s window allocation
    ///
    /// On error `frame` may hold a partially updated window and must not be
    /// drawn.
    pub fn render_frame_into(
        &mut self,
        frame: &mut RenderFrame,
        requested_samples: usize,
        delay_samples: u64,
    ) -> FrameResult<()> {
        let snapshot = self.latest_snapshot().inspect_err(|e| {
            log::trace!("Render frame skipped: {}", e);
        })?;

        let end = snapshot.history_end.saturating_sub(delay_samples);
        self.shared
            .history
            .read_window_into(&mut frame.window, requested_samples, end)
            .inspect_err(|e| log::trace!("Render window skipped: {}", e))?;

        // Rewind by the offset actually returned; negative if a delay reaching
        // past the retained history made the store hand back later frames
        let rewind = snapshot.history_end as f64 - frame.window.end_offset() as f64;
        frame.phase = positive_fraction(snapshot.phase - rewind * snapshot.phase_per_sample);
        frame.phase_reliable = snapshot.phase_reliable;
        frame.tempo_used = snapshot.tempo_bpm;
        frame.phase_per_sample = snapshot.phase_per_sample;
        frame.sample_rate = snapshot.sample_rate;
        frame.transport = snapshot.transport();
        frame.reset_suggested = match self.last_epoch {
            Some(epoch) => epoch != snapshot.reset_epoch,
            None => snapshot.reset_suggested,
        };
        self.last_epoch = Some(snapshot.reset_epoch);
        Ok(())
    }

    /// Most recent `length` frames of history, without a snapshot
    pub fn read_most_recent(&self, length: usize) -> ReadResult<SampleWindow> {
        self.shared.history.read_most_recent(length)
    }

    /// Window length for the current time mode and the latest tempo
    pub fn resolve_window(&self) -> ResolvedWindow {
        let (host_tempo, last_known) = match self.latest_snapshot() {
            Ok(snapshot) => (snapshot.tempo_reliable.then_some(snapshot.tempo_bpm), snapshot.tempo_bpm),
            Err(_) => (None, DEFAULT_TEMPO_BPM),
        };
        self.time_mode().resolve(host_tempo, last_known)
    }

    /// Window length in samples at the running sample rate
    pub fn window_samples(&self) -> usize {
        self.resolve_window().samples(self.sample_rate())
    }

    pub fn set_time_mode(&self, mode: TimeMode) {
        self.shared.time_mode.store(mode);
    }

    pub fn time_mode(&self) -> TimeMode {
        self.shared.time_mode.load()
    }

    /// Sample rate of the running stream (0 before configure)
    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.shared.sample_rate.load(Ordering::Relaxed))
    }

    /// Per-channel history capacity (0 before configure)
    pub fn history_capacity(&self) -> usize {
        self.shared.history.capacity()
    }

    pub fn channels(&self) -> usize {
        self.shared.history.channels()
    }
}
