//! Per-block frame snapshot
//!
//! One snapshot describes one audio block boundary: where the history ends
//! and what the clock said about that sample. It crosses threads as a
//! [`RawFrame`] through a `SeqCell`, so a reader always gets all fields from
//! the same block.

use std::time::Duration;

use bytemuck::{Pod, Zeroable};

use crate::clock::advance_phase;
use crate::history::SampleWindow;

const FLAG_PUBLISHED: u32 = 1 << 0;
const FLAG_PHASE_RELIABLE: u32 = 1 << 1;
const FLAG_RESET_SUGGESTED: u32 = 1 << 2;
const FLAG_PLAYING: u32 = 1 << 3;
const FLAG_TEMPO_RELIABLE: u32 = 1 << 4;
const FLAG_HAS_SECONDS: u32 = 1 << 5;

/// Wire form of a [`FrameSnapshot`] (plain words, no padding)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub(crate) struct RawFrame {
    history_end: u64,
    phase: f64,
    tempo_bpm: f64,
    transport_seconds: f64,
    phase_per_sample: f64,
    sample_rate: f64,
    beats_in_loop: f64,
    flags: u32,
    reset_epoch: u32,
}

/// Transport fields of a snapshot, for display
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportSnapshot {
    pub is_playing: bool,
    pub tempo_bpm: f64,
    pub tempo_reliable: bool,
    /// Host time at the start of the block, when the host reports one
    pub seconds: Option<f64>,
    /// Absolute history offset the snapshot describes
    pub history_end: u64,
}

/// Everything published for one audio block
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSnapshot {
    /// Absolute history offset one past the block's last frame
    pub history_end: u64,
    /// Loop phase in `[0, 1)` at `history_end`
    pub phase: f64,
    pub phase_reliable: bool,
    /// This block itself suggested a reset
    pub reset_suggested: bool,
    pub tempo_bpm: f64,
    pub tempo_reliable: bool,
    pub is_playing: bool,
    pub transport_seconds: Option<f64>,
    /// Phase advance per sample (0 when stopped)
    pub phase_per_sample: f64,
    pub sample_rate: f64,
    pub beats_in_loop: f64,
    /// Incremented for every block that suggested a reset
    pub reset_epoch: u32,
}

impl FrameSnapshot {
    #[inline]
    pub fn phase_per_second(&self) -> f64 {
        self.phase_per_sample * self.sample_rate
    }

    pub fn transport(&self) -> TransportSnapshot {
        TransportSnapshot {
            is_playing: self.is_playing,
            tempo_bpm: self.tempo_bpm,
            tempo_reliable: self.tempo_reliable,
            seconds: self.transport_seconds,
            history_end: self.history_end,
        }
    }

    pub(crate) fn to_raw(self) -> RawFrame {
        let mut flags = FLAG_PUBLISHED;
        for (set, flag) in [
            (self.phase_reliable, FLAG_PHASE_RELIABLE),
            (self.reset_suggested, FLAG_RESET_SUGGESTED),
            (self.is_playing, FLAG_PLAYING),
            (self.tempo_reliable, FLAG_TEMPO_RELIABLE),
            (self.transport_seconds.is_some(), FLAG_HAS_SECONDS),
        ] {
            if set {
                flags |= flag;
            }
        }

        RawFrame {
            history_end: self.history_end,
            phase: self.phase,
            tempo_bpm: self.tempo_bpm,
            transport_seconds: self.transport_seconds.unwrap_or(0.0),
            phase_per_sample: self.phase_per_sample,
            sample_rate: self.sample_rate,
            beats_in_loop: self.beats_in_loop,
            flags,
            reset_epoch: self.reset_epoch,
        }
    }

    /// `None` until something was published
    pub(crate) fn from_raw(raw: &RawFrame) -> Option<Self> {
        if raw.flags & FLAG_PUBLISHED == 0 {
            return None;
        }
        let has = |flag: u32| raw.flags & flag != 0;
        Some(Self {
            history_end: raw.history_end,
            phase: raw.phase,
            phase_reliable: has(FLAG_PHASE_RELIABLE),
            reset_suggested: has(FLAG_RESET_SUGGESTED),
            tempo_bpm: raw.tempo_bpm,
            tempo_reliable: has(FLAG_TEMPO_RELIABLE),
            is_playing: has(FLAG_PLAYING),
            transport_seconds: has(FLAG_HAS_SECONDS).then_some(raw.transport_seconds),
            phase_per_sample: raw.phase_per_sample,
            sample_rate: raw.sample_rate,
            beats_in_loop: raw.beats_in_loop,
            reset_epoch: raw.reset_epoch,
        })
    }
}

/// A sample window plus the phase and transport state at its last frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    pub window: SampleWindow,
    /// Loop phase at the window's end (delay compensation applied)
    pub phase: f64,
    pub phase_reliable: bool,
    /// A reset happened since this consumer's previous frame
    pub reset_suggested: bool,
    pub tempo_used: f64,
    pub phase_per_sample: f64,
    pub sample_rate: f64,
    pub transport: TransportSnapshot,
}

impl RenderFrame {
    /// Phase advanced by wall-clock time since the frame was taken
    pub fn projected_phase(&self, elapsed: Duration) -> f64 {
        advance_phase(
            self.phase,
            self.phase_per_sample * self.sample_rate,
            self.phase_reliable && self.transport.is_playing,
            elapsed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_frame_has_no_padding() {
        assert_eq!(std::mem::size_of::<RawFrame>(), 64);
    }

    #[test]
    fn test_unpublished_frame_is_none() {
        assert_eq!(FrameSnapshot::from_raw(&RawFrame::default()), None);
    }

    #[test]
    fn test_flags_survive_conversion() {
        let snapshot = FrameSnapshot {
            history_end: 4096,
            phase: 0.75,
            phase_reliable: true,
            reset_suggested: false,
            tempo_bpm: 128.0,
            tempo_reliable: true,
            is_playing: true,
            transport_seconds: Some(12.5),
            phase_per_sample: 1.0e-5,
            sample_rate: 44_100.0,
            beats_in_loop: 4.0,
            reset_epoch: 3,
        };
        assert_eq!(FrameSnapshot::from_raw(&snapshot.to_raw()), Some(snapshot));

        let stopped = FrameSnapshot {
            transport_seconds: None,
            is_playing: false,
            ..snapshot
        };
        let decoded = FrameSnapshot::from_raw(&stopped.to_raw()).unwrap();
        assert_eq!(decoded.transport_seconds, None);
        assert!(!decoded.is_playing);
        assert_eq!(decoded.transport().history_end, 4096);
    }

    #[test]
    fn test_render_frame_projection() {
        let frame = RenderFrame {
            phase: 0.5,
            phase_reliable: true,
            phase_per_sample: 0.5 / 48_000.0,
            sample_rate: 48_000.0,
            transport: TransportSnapshot {
                is_playing: true,
                ..TransportSnapshot::default()
            },
            ..RenderFrame::default()
        };
        assert!((frame.projected_phase(Duration::from_millis(100)) - 0.55).abs() < 1.0e-9);

        let stopped = RenderFrame {
            transport: TransportSnapshot::default(),
            ..frame
        };
        assert_eq!(stopped.projected_phase(Duration::from_millis(100)), 0.5);
    }
}
