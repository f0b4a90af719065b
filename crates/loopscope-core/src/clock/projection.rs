//! Render-side phase projection
//!
//! Snapshots arrive once per audio block, but the screen refreshes on its
//! own clock. Projecting the published phase by the wall-clock time since the
//! snapshot keeps the playhead moving smoothly between blocks.

use std::time::Duration;

use crate::bridge::FrameSnapshot;
use crate::types::positive_fraction;

/// Longest gap a phase is projected across
pub const MAX_PROJECTION: Duration = Duration::from_millis(120);

/// Phase of `snapshot` advanced by `elapsed`
///
/// Unreliable or stopped phases are returned unchanged.
pub fn project_phase(snapshot: &FrameSnapshot, elapsed: Duration) -> f64 {
    advance_phase(
        snapshot.phase,
        snapshot.phase_per_second(),
        snapshot.phase_reliable && snapshot.is_playing,
        elapsed,
    )
}

/// Advance `phase` at `phase_per_second` for at most [`MAX_PROJECTION`]
#[inline]
pub(crate) fn advance_phase(phase: f64, phase_per_second: f64, running: bool, elapsed: Duration) -> f64 {
    if !running {
        return phase;
    }
    let elapsed = elapsed.min(MAX_PROJECTION).as_secs_f64();
    positive_fraction(phase + phase_per_second * elapsed)
}
