//! Host transport as reported to the audio callback

/// What the host told us about its transport for one block
///
/// Every field is optional: plugin hosts and audio drivers report different
/// subsets, and standalone capture reports nothing at all. `position_beats`
/// and `time_samples` describe the first sample of the block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostTransport {
    pub is_playing: Option<bool>,
    pub position_beats: Option<f64>,
    pub tempo_bpm: Option<f64>,
    pub time_seconds: Option<f64>,
    pub time_samples: Option<i64>,
}

impl HostTransport {
    /// Transport with nothing known (treated as playing)
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Playing at `tempo_bpm`, positioned at `position_beats`
    pub fn playing(position_beats: f64, tempo_bpm: f64) -> Self {
        Self {
            is_playing: Some(true),
            position_beats: Some(position_beats),
            tempo_bpm: Some(tempo_bpm),
            ..Self::default()
        }
    }

    /// Explicitly stopped
    pub fn stopped() -> Self {
        Self {
            is_playing: Some(false),
            ..Self::default()
        }
    }

    pub fn with_time(mut self, time_samples: i64, sample_rate: f64) -> Self {
        self.time_samples = Some(time_samples);
        if sample_rate > 0.0 {
            self.time_seconds = Some(time_samples as f64 / sample_rate);
        }
        self
    }

    /// Unknown play state counts as playing
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.is_playing.unwrap_or(true)
    }

    /// Host tempo if it is usable (finite and positive)
    #[inline]
    pub fn valid_tempo(&self) -> Option<f64> {
        self.tempo_bpm.filter(|bpm| bpm.is_finite() && *bpm > 0.0)
    }

    /// Host position if it is usable (finite)
    #[inline]
    pub fn valid_position(&self) -> Option<f64> {
        self.position_beats.filter(|beats| beats.is_finite())
    }

    /// Host time in seconds if it is usable (finite)
    #[inline]
    pub fn valid_seconds(&self) -> Option<f64> {
        self.time_seconds.filter(|seconds| seconds.is_finite())
    }
}
