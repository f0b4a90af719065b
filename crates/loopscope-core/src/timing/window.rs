//! Display window length from a sync division or a free duration

use serde::{Deserialize, Serialize};

use crate::types::MIN_TEMPO_BPM;

/// Shortest free-mode window (ms)
pub const MIN_FREE_MS: f64 = 10.0;

/// Longest free-mode window (ms)
pub const MAX_FREE_MS: f64 = 12_000.0;

/// Default free-mode window (ms)
pub const DEFAULT_FREE_MS: f64 = 4_000.0;

/// Default sync division (1/1, one bar)
pub const DEFAULT_DIVISION_INDEX: usize = 6;

/// A musical window length as a fraction of a 4/4 bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncDivision {
    pub numerator: u32,
    pub denominator: u32,
}

impl SyncDivision {
    const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Length in beats (one bar = 4 beats)
    #[inline]
    pub fn beats(&self) -> f64 {
        4.0 * self.numerator as f64 / self.denominator as f64
    }

    /// Length in milliseconds at `bpm` (floored at 1 BPM)
    #[inline]
    pub fn ms_at(&self, bpm: f64) -> f64 {
        self.beats() * 60_000.0 / bpm.max(MIN_TEMPO_BPM)
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.numerator, self.denominator)
    }
}

/// Selectable sync divisions, shortest first
pub const SYNC_DIVISIONS: [SyncDivision; 9] = [
    SyncDivision::new(1, 64),
    SyncDivision::new(1, 32),
    SyncDivision::new(1, 16),
    SyncDivision::new(1, 8),
    SyncDivision::new(1, 4),
    SyncDivision::new(1, 2),
    SyncDivision::new(1, 1),
    SyncDivision::new(2, 1),
    SyncDivision::new(4, 1),
];

/// Division at `index`, clamped into the table
#[inline]
pub fn division(index: usize) -> SyncDivision {
    SYNC_DIVISIONS[index.min(SYNC_DIVISIONS.len() - 1)]
}

/// How the window length is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TimeMode {
    /// Follow the tempo: the window is a musical division
    Sync { division: usize },
    /// Fixed duration in milliseconds
    Free { ms: f64 },
}

impl Default for TimeMode {
    fn default() -> Self {
        TimeMode::Sync {
            division: DEFAULT_DIVISION_INDEX,
        }
    }
}

impl TimeMode {
    pub fn is_sync(&self) -> bool {
        matches!(self, TimeMode::Sync { .. })
    }

    /// Resolve against the host tempo (if any) and the last known tempo
    pub fn resolve(&self, host_tempo: Option<f64>, last_known_tempo: f64) -> ResolvedWindow {
        match *self {
            TimeMode::Sync { division } => {
                resolve_window(true, division, DEFAULT_FREE_MS, host_tempo, last_known_tempo)
            }
            TimeMode::Free { ms } => {
                resolve_window(false, DEFAULT_DIVISION_INDEX, ms, host_tempo, last_known_tempo)
            }
        }
    }
}

/// A resolved display window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWindow {
    pub ms: f64,
    /// Tempo the window was computed with
    pub tempo_used: f64,
    /// The host supplied a usable tempo
    pub tempo_reliable: bool,
    /// Window length in beats at `tempo_used`
    pub beats: f64,
}

impl ResolvedWindow {
    /// Window length in samples (at least one)
    #[inline]
    pub fn samples(&self, sample_rate: f64) -> usize {
        let samples = (self.ms * sample_rate.max(0.0) / 1000.0).round();
        if samples.is_finite() && samples >= 1.0 {
            samples as usize
        } else {
            1
        }
    }
}

/// Resolve a window length. Pure.
///
/// A missing, zero or non-finite host tempo falls back to `last_known_tempo`
/// (floored at 1 BPM) with `tempo_reliable = false`.
pub fn resolve_window(
    sync: bool,
    division_index: usize,
    duration_ms: f64,
    host_tempo: Option<f64>,
    last_known_tempo: f64,
) -> ResolvedWindow {
    let host_tempo = host_tempo.filter(|bpm| bpm.is_finite() && *bpm > 0.0);
    let fallback = if last_known_tempo.is_finite() {
        last_known_tempo.max(MIN_TEMPO_BPM)
    } else {
        MIN_TEMPO_BPM
    };
    let tempo_used = host_tempo.map_or(fallback, |bpm| bpm.max(MIN_TEMPO_BPM));

    if sync {
        let division = division(division_index);
        ResolvedWindow {
            ms: division.ms_at(tempo_used),
            tempo_used,
            tempo_reliable: host_tempo.is_some(),
            beats: division.beats(),
        }
    } else {
        let ms = if duration_ms.is_nan() {
            DEFAULT_FREE_MS
        } else {
            duration_ms.clamp(MIN_FREE_MS, MAX_FREE_MS)
        };
        ResolvedWindow {
            ms,
            tempo_used,
            tempo_reliable: host_tempo.is_some(),
            beats: ms * tempo_used / 60_000.0,
        }
    }
}
