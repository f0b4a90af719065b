//! Common types for Loopscope
//!
//! Fundamental audio types shared by the bridge, the history store and the
//! monitor: sample type, incoming block views and channel display views.

use serde::{Deserialize, Serialize};

/// Default sample rate assumed before the pipeline is configured
pub const DEFAULT_SAMPLE_RATE: f64 = 48000.0;

/// Default tempo used until a host reports one
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// Lowest tempo the clock and resolver will ever use
pub const MIN_TEMPO_BPM: f64 = 1.0;

/// Maximum number of channels kept in the history (stereo)
pub const MAX_CHANNELS: usize = 2;

/// Audio sample type (32-bit float)
pub type Sample = f32;

/// A borrowed block of audio handed to the producer by the audio callback
///
/// Hosts deliver audio either interleaved `[L, R, L, R, ...]` (CPAL) or as
/// one slice per channel (plugin APIs). Both are read without copying.
#[derive(Debug, Clone, Copy)]
pub enum AudioBlock<'a> {
    /// Interleaved frames with `channels` samples per frame
    Interleaved { data: &'a [Sample], channels: usize },
    /// One slice per channel, all of the same length
    Planar(&'a [&'a [Sample]]),
}

impl<'a> AudioBlock<'a> {
    /// Number of channels in the block
    #[inline]
    pub fn channels(&self) -> usize {
        match self {
            AudioBlock::Interleaved { channels, .. } => *channels,
            AudioBlock::Planar(channels) => channels.len(),
        }
    }

    /// Number of frames in the block
    ///
    /// For planar blocks with mismatched lengths the shortest channel wins.
    #[inline]
    pub fn frames(&self) -> usize {
        match self {
            AudioBlock::Interleaved { data, channels } => {
                if *channels == 0 {
                    0
                } else {
                    data.len() / channels
                }
            }
            AudioBlock::Planar(channels) => channels.iter().map(|c| c.len()).min().unwrap_or(0),
        }
    }

    /// Read one sample. Channels past the last one repeat the last channel,
    /// so a mono block fills both sides of a stereo history.
    ///
    /// The caller must keep `frame < self.frames()` and `self.channels() > 0`.
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> Sample {
        match self {
            AudioBlock::Interleaved { data, channels } => {
                let ch = channel.min(channels - 1);
                data[frame * channels + ch]
            }
            AudioBlock::Planar(channels) => {
                let ch = channel.min(channels.len() - 1);
                channels[ch][frame]
            }
        }
    }
}

/// Which signal a waveform lane displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelView {
    #[default]
    Left,
    Right,
    Mono,
    Mid,
    Side,
}

impl ChannelView {
    /// All views in display order
    pub const ALL: [ChannelView; 5] = [
        ChannelView::Left,
        ChannelView::Right,
        ChannelView::Mono,
        ChannelView::Mid,
        ChannelView::Side,
    ];

    /// Combine a stereo pair into the displayed value
    #[inline]
    pub fn mix(self, left: Sample, right: Sample) -> Sample {
        match self {
            ChannelView::Left => left,
            ChannelView::Right => right,
            ChannelView::Mono | ChannelView::Mid => 0.5 * (left + right),
            ChannelView::Side => 0.5 * (left - right),
        }
    }

    /// Display label
    pub fn name(self) -> &'static str {
        match self {
            ChannelView::Left => "L",
            ChannelView::Right => "R",
            ChannelView::Mono => "Mono",
            ChannelView::Mid => "Mid",
            ChannelView::Side => "Side",
        }
    }
}

/// Positive fractional part, always in `[0, 1)`
#[inline]
pub fn positive_fraction(value: f64) -> f64 {
    let fraction = value - value.floor();
    if fraction >= 1.0 || !fraction.is_finite() {
        0.0
    } else {
        fraction
    }
}
