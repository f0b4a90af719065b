//! Tempo/transport-driven loop phase
//!
//! [`TransportClock`] turns the host's per-block transport report into a
//! normalized loop phase in `[0, 1)`, where one loop is `beats_in_loop` host
//! beats. It keeps tracking through blocks without a host position by
//! extrapolating from the last anchor, and flags discontinuities (restart,
//! seeks, tempo or loop-length changes) so the renderer can clear its trails.
//!
//! Runs on the audio thread: no allocation, no locking, no logging.

use serde::{Deserialize, Serialize};

use crate::types::{positive_fraction, DEFAULT_SAMPLE_RATE, DEFAULT_TEMPO_BPM, MIN_TEMPO_BPM};

use super::HostTransport;

/// Backward movement (in loops) treated as host jitter and suppressed
pub const DEFAULT_JITTER_TOLERANCE: f64 = 0.03;

/// Unexpected movement (in loops) treated as a seek
pub const DEFAULT_SEEK_DISTANCE: f64 = 0.35;

/// Tempo change (BPM) that counts as a new tempo
pub const DEFAULT_TEMPO_TOLERANCE_BPM: f64 = 0.01;

/// Loop length used when the caller passes nonsense
const FALLBACK_BEATS_IN_LOOP: f64 = 4.0;

/// Thresholds for jitter suppression and discontinuity detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockTuning {
    pub jitter_tolerance: f64,
    pub seek_distance: f64,
    pub tempo_tolerance_bpm: f64,
}

impl Default for ClockTuning {
    fn default() -> Self {
        Self {
            jitter_tolerance: DEFAULT_JITTER_TOLERANCE,
            seek_distance: DEFAULT_SEEK_DISTANCE,
            tempo_tolerance_bpm: DEFAULT_TEMPO_TOLERANCE_BPM,
        }
    }
}

/// Everything the clock needs to know about one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockInput {
    pub transport: HostTransport,
    /// Local sample offset of the block's first frame
    pub block_start: u64,
    pub block_len: usize,
    pub sample_rate: f64,
    /// Host beats in one loop cycle
    pub beats_in_loop: f64,
}

/// Clock result for one block, describing the block's end
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClockOutput {
    /// Loop phase in `[0, 1)` at the end of the block
    pub phase: f64,
    pub phase_reliable: bool,
    pub reset_suggested: bool,
    pub tempo_bpm: f64,
    pub tempo_reliable: bool,
    pub is_playing: bool,
    /// Phase advance per sample while playing (0 when stopped)
    pub phase_per_sample: f64,
}

/// Host beats at a local sample offset, and the tempo to extrapolate with
#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    beats: f64,
    sample: u64,
    tempo_bpm: f64,
}

/// Block bounds and rates after input validation
#[derive(Debug, Clone, Copy)]
struct BlockSpan {
    start: u64,
    end: u64,
    sample_rate: f64,
    beats_in_loop: f64,
}

impl Anchor {
    #[inline]
    fn beats_at(&self, sample: u64, sample_rate: f64) -> f64 {
        let elapsed = sample.saturating_sub(self.sample) as f64;
        self.beats + elapsed * self.tempo_bpm / (60.0 * sample_rate)
    }
}

/// State carried from one block to the next
#[derive(Debug, Clone, PartialEq)]
pub struct ClockState {
    initialized: bool,
    phase: f64,
    phase_reliable: bool,
    last_tempo_bpm: f64,
    is_playing: bool,
    beats_in_loop: f64,
    anchor: Option<Anchor>,
    had_host_position: bool,
    /// Host sample time and length of the previous block
    last_host_time: Option<(i64, usize)>,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            initialized: false,
            phase: 0.0,
            phase_reliable: false,
            last_tempo_bpm: DEFAULT_TEMPO_BPM,
            is_playing: false,
            beats_in_loop: FALLBACK_BEATS_IN_LOOP,
            anchor: None,
            had_host_position: false,
            last_host_time: None,
        }
    }
}

impl ClockState {
    /// Whether a playing block has been processed since the last reset
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Last output phase
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn phase_reliable(&self) -> bool {
        self.phase_reliable
    }

    /// Last tempo reported by the host (or the default before any)
    pub fn last_tempo_bpm(&self) -> f64 {
        self.last_tempo_bpm
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Record the host's sample time and report whether it jumped
    fn observe_host_time(&mut self, time: Option<i64>, block_len: usize, sample_rate: f64) -> bool {
        let jumped = match (self.last_host_time, time) {
            (Some((previous, previous_len)), Some(now)) => {
                let delta = now.saturating_sub(previous);
                let expected = previous_len as i64;
                let tolerance = (2 * expected).max((sample_rate * 0.02) as i64);
                delta < 0 || (delta - expected).abs() > tolerance
            }
            _ => false,
        };
        self.last_host_time = time.map(|t| (t, block_len));
        jumped
    }
}

/// Loop phase state machine (one per producer)
#[derive(Debug, Clone, Default)]
pub struct TransportClock {
    tuning: ClockTuning,
    state: ClockState,
}

impl TransportClock {
    pub fn new(tuning: ClockTuning) -> Self {
        Self {
            tuning,
            state: ClockState::default(),
        }
    }

    pub fn tuning(&self) -> ClockTuning {
        self.tuning
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    /// Forget everything, including the last known tempo
    pub fn reset(&mut self) {
        self.state = ClockState::default();
    }

    /// Treat the next playing block as a fresh start, keeping the held phase
    /// and last known tempo
    pub fn restart(&mut self) {
        self.state.initialized = false;
        self.state.anchor = None;
        self.state.last_host_time = None;
    }

    /// Advance by one block
    pub fn process(&mut self, input: &ClockInput) -> ClockOutput {
        let sample_rate = if input.sample_rate.is_finite() && input.sample_rate > 0.0 {
            input.sample_rate
        } else {
            DEFAULT_SAMPLE_RATE
        };
        let beats_in_loop = if input.beats_in_loop.is_finite() && input.beats_in_loop > 0.0 {
            input.beats_in_loop
        } else {
            FALLBACK_BEATS_IN_LOOP
        };
        let transport = &input.transport;
        let block_end = input.block_start + input.block_len as u64;

        let host_tempo = transport.valid_tempo();
        let tempo_changed = host_tempo.is_some_and(|bpm| {
            self.state.initialized
                && (bpm - self.state.last_tempo_bpm).abs() > self.tuning.tempo_tolerance_bpm
        });
        if let Some(bpm) = host_tempo {
            self.state.last_tempo_bpm = bpm;
        }
        let tempo = self.state.last_tempo_bpm.max(MIN_TEMPO_BPM);

        let host_jump = self
            .state
            .observe_host_time(transport.time_samples, input.block_len, sample_rate);
        let loop_changed =
            self.state.initialized && (beats_in_loop - self.state.beats_in_loop).abs() > 1.0e-9;
        self.state.beats_in_loop = beats_in_loop;

        let host_beats = transport.valid_position();

        if !transport.is_playing() {
            return self.hold(host_beats, block_end, tempo, host_tempo.is_some());
        }

        let starting = !self.state.initialized || !self.state.is_playing;
        let beats_per_sample = tempo / (60.0 * sample_rate);
        let phase_per_sample = beats_per_sample / beats_in_loop;
        let expected_advance = phase_per_sample * input.block_len as f64;
        let mut reset = starting || loop_changed || tempo_changed || host_jump;

        let phase = match host_beats {
            Some(beats) => {
                let beats_end = beats + input.block_len as f64 * beats_per_sample;
                let target = positive_fraction(beats_end / beats_in_loop);
                self.state.anchor = Some(Anchor {
                    beats: beats_end,
                    sample: block_end,
                    tempo_bpm: tempo,
                });
                let phase = if reset {
                    target
                } else {
                    self.follow_host(target, expected_advance, &mut reset)
                };
                self.state.had_host_position = true;
                phase
            }
            None => {
                let re_anchor = starting || loop_changed;
                let span = BlockSpan {
                    start: input.block_start,
                    end: block_end,
                    sample_rate,
                    beats_in_loop,
                };
                let phase = self.extrapolate(span, tempo, re_anchor, expected_advance);
                self.state.had_host_position = false;
                phase
            }
        };

        self.state.phase = phase;
        self.state.phase_reliable = host_beats.is_some();
        self.state.initialized = true;
        self.state.is_playing = true;

        ClockOutput {
            phase,
            phase_reliable: host_beats.is_some(),
            reset_suggested: reset,
            tempo_bpm: tempo,
            tempo_reliable: host_tempo.is_some(),
            is_playing: true,
            phase_per_sample,
        }
    }

    /// Stopped: hold the phase and park the anchor at the current position
    fn hold(&mut self, host_beats: Option<f64>, block_end: u64, tempo: f64, tempo_reliable: bool) -> ClockOutput {
        let beats = host_beats.unwrap_or(self.state.phase * self.state.beats_in_loop);
        self.state.anchor = Some(Anchor {
            beats,
            sample: block_end,
            tempo_bpm: tempo,
        });
        self.state.is_playing = false;
        self.state.phase_reliable = self.state.initialized;

        ClockOutput {
            phase: self.state.phase,
            phase_reliable: self.state.initialized,
            reset_suggested: false,
            tempo_bpm: tempo,
            tempo_reliable,
            is_playing: false,
            phase_per_sample: 0.0,
        }
    }

    /// Follow a valid host position, suppressing jitter and flagging seeks
    fn follow_host(&self, target: f64, expected_advance: f64, reset: &mut bool) -> f64 {
        // One block covers half a loop or more: direction is ambiguous
        if expected_advance >= 0.5 {
            return target;
        }

        let previous = self.state.phase;
        let delta = wrap_signed(target - previous);
        if delta < 0.0 {
            if -delta <= self.tuning.jitter_tolerance {
                return previous;
            }
            *reset = true;
            return target;
        }

        if !self.state.had_host_position {
            // Position regained after a dropout
            if delta > self.tuning.seek_distance {
                *reset = true;
            }
        } else if (delta - expected_advance).abs() > self.tuning.seek_distance {
            *reset = true;
        }
        target
    }

    /// No host position: extrapolate from the anchor with the current tempo
    fn extrapolate(&mut self, span: BlockSpan, tempo: f64, re_anchor: bool, expected_advance: f64) -> f64 {
        let previous = self.state.phase;
        let anchor = match self.state.anchor {
            Some(anchor) if !re_anchor && anchor.tempo_bpm == tempo => anchor,
            // Tempo moved: continue from where we are with the new rate
            _ => Anchor {
                beats: previous * span.beats_in_loop,
                sample: span.start,
                tempo_bpm: tempo,
            },
        };
        self.state.anchor = Some(anchor);

        let phase = positive_fraction(anchor.beats_at(span.end, span.sample_rate) / span.beats_in_loop);
        if !re_anchor && expected_advance < 0.5 && wrap_signed(phase - previous) < 0.0 {
            previous
        } else {
            phase
        }
    }
}

/// Shortest signed distance between two phases, in `[-0.5, 0.5)`
#[inline]
pub fn wrap_signed(delta: f64) -> f64 {
    positive_fraction(delta + 0.5) - 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 48_000.0;
    const BPM: f64 = 120.0;

    struct Driver {
        clock: TransportClock,
        offset: u64,
        beats_in_loop: f64,
    }

    impl Driver {
        fn new() -> Self {
            Self {
                clock: TransportClock::new(ClockTuning::default()),
                offset: 0,
                beats_in_loop: 4.0,
            }
        }

        fn step(&mut self, transport: HostTransport, len: usize) -> ClockOutput {
            let out = self.clock.process(&ClockInput {
                transport,
                block_start: self.offset,
                block_len: len,
                sample_rate: SAMPLE_RATE,
                beats_in_loop: self.beats_in_loop,
            });
            self.offset += len as u64;
            out
        }

        /// Host beats matching the local offset at a steady tempo
        fn host_beats(&self) -> f64 {
            self.offset as f64 * BPM / (60.0 * SAMPLE_RATE)
        }

        fn step_with_host(&mut self, len: usize) -> ClockOutput {
            let transport = HostTransport::playing(self.host_beats(), BPM);
            self.step(transport, len)
        }
    }

    fn assert_forward(previous: f64, current: f64) {
        assert!(
            current >= previous || previous - current > 0.5,
            "phase moved backward: {} -> {}",
            previous,
            current
        );
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1.0e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_wrap_signed() {
        assert_close(wrap_signed(-0.005), -0.005);
        assert_close(wrap_signed(0.495), 0.495);
        assert_close(wrap_signed(0.9), -0.1);
        assert_close(wrap_signed(-0.9), 0.1);
    }

    #[test]
    fn test_host_position_is_monotonic_over_many_blocks() {
        let mut driver = Driver::new();
        let first = driver.step_with_host(256);
        assert!(first.reset_suggested);
        assert!(first.phase_reliable);

        let mut previous = first.phase;
        for i in 0..10_000usize {
            let len = (i * 37) % 500 + 16;
            let out = driver.step_with_host(len);
            assert_forward(previous, out.phase);
            assert!(!out.reset_suggested, "unexpected reset at block {}", i);
            assert!(out.phase >= 0.0 && out.phase < 1.0);
            assert!(out.phase_reliable);
            previous = out.phase;
        }
    }

    #[test]
    fn test_phase_describes_block_end() {
        let mut driver = Driver::new();
        // 480 samples at 120 BPM = 0.02 beats = 0.005 of a 4-beat loop
        let out = driver.step(HostTransport::playing(0.0, BPM), 480);
        assert_close(out.phase, 0.005);
        assert_close(out.phase_per_sample, 0.005 / 480.0);
    }

    #[test]
    fn test_dropout_extrapolates_forward() {
        let mut driver = Driver::new();
        for _ in 0..100 {
            driver.step_with_host(512);
        }
        let mut previous = driver.clock.state().phase();

        let dropout = HostTransport {
            is_playing: Some(true),
            ..HostTransport::default()
        };
        for _ in 0..2_000 {
            let out = driver.step(dropout, 512);
            assert!(!out.phase_reliable);
            assert!(!out.reset_suggested);
            assert!(!out.tempo_reliable);
            assert_eq!(out.tempo_bpm, BPM);
            assert_forward(previous, out.phase);
            previous = out.phase;
        }

        // Extrapolation keeps time with where the host would have been
        let expected = positive_fraction(driver.host_beats() / 4.0);
        assert!(wrap_signed(previous - expected).abs() < 1.0e-6);
    }

    #[test]
    fn test_resume_far_from_held_phase_suggests_reset() {
        let mut driver = Driver::new();
        for _ in 0..50 {
            driver.step_with_host(512);
        }
        for _ in 0..50 {
            driver.step(HostTransport::unknown(), 512);
        }
        // Host comes back 0.4 loops ahead of where we think it is
        let transport = HostTransport::playing(driver.host_beats() + 1.6, BPM);
        let out = driver.step(transport, 512);
        assert!(out.reset_suggested);
        assert!(out.phase_reliable);
    }

    #[test]
    fn test_resume_near_held_phase_is_seamless() {
        let mut driver = Driver::new();
        for _ in 0..50 {
            driver.step_with_host(512);
        }
        for _ in 0..50 {
            driver.step(HostTransport::unknown(), 512);
        }
        let out = driver.step_with_host(512);
        assert!(!out.reset_suggested);
        assert!(out.phase_reliable);
    }

    #[test]
    fn test_stop_holds_phase() {
        let mut driver = Driver::new();
        for _ in 0..20 {
            driver.step_with_host(480);
        }
        let held = driver.clock.state().phase();

        for _ in 0..10 {
            let out = driver.step(HostTransport::stopped(), 480);
            assert_eq!(out.phase, held);
            assert!(out.phase_reliable);
            assert!(!out.reset_suggested);
            assert!(!out.is_playing);
            assert_eq!(out.phase_per_sample, 0.0);
        }
    }

    #[test]
    fn test_stopped_before_start_is_unreliable() {
        let mut driver = Driver::new();
        let out = driver.step(HostTransport::stopped(), 480);
        assert!(!out.phase_reliable);
        assert_eq!(out.phase, 0.0);
    }

    #[test]
    fn test_restart_suggests_reset_once() {
        let mut driver = Driver::new();
        for _ in 0..5 {
            driver.step_with_host(480);
        }
        driver.step(HostTransport::stopped(), 480);

        let restarted = driver.step(HostTransport::playing(0.0, BPM), 480);
        assert!(restarted.reset_suggested);
        assert_close(restarted.phase, 0.005);

        let next = driver.step(HostTransport::playing(0.02, BPM), 480);
        assert!(!next.reset_suggested);
    }

    #[test]
    fn test_jitter_held_and_seeks_flagged() {
        let mut driver = Driver::new();
        driver.step(HostTransport::playing(0.0, BPM), 480);
        let out = driver.step(HostTransport::playing(0.02, BPM), 480);
        assert_close(out.phase, 0.01);

        // Slightly behind: held, no reset
        let out = driver.step(HostTransport::playing(0.0, BPM), 480);
        assert_close(out.phase, 0.01);
        assert!(!out.reset_suggested);

        // Far ahead: forward seek
        let out = driver.step(HostTransport::playing(2.0, BPM), 480);
        assert_close(out.phase, 0.505);
        assert!(out.reset_suggested);

        // Far behind: backward seek
        let out = driver.step(HostTransport::playing(1.0, BPM), 480);
        assert_close(out.phase, 0.255);
        assert!(out.reset_suggested);
    }

    #[test]
    fn test_forward_wrap_is_not_a_seek() {
        let mut driver = Driver::new();
        let first = driver.step(HostTransport::playing(3.9, BPM), 480);
        assert!(first.phase > 0.97);

        let mut beats = 3.92;
        let mut wrapped = false;
        for _ in 0..5 {
            let out = driver.step(HostTransport::playing(beats, BPM), 480);
            assert!(!out.reset_suggested);
            wrapped |= out.phase < 0.01;
            beats += 0.02;
        }
        assert!(wrapped);
    }

    #[test]
    fn test_tempo_change_reanchors_without_zeroing() {
        let mut driver = Driver::new();
        let tempo_only = |bpm| HostTransport {
            is_playing: Some(true),
            tempo_bpm: Some(bpm),
            ..HostTransport::default()
        };
        for _ in 0..10 {
            driver.step(tempo_only(120.0), 480);
        }
        let before = driver.clock.state().phase();
        assert_close(before, 0.05);

        let out = driver.step(tempo_only(140.0), 480);
        assert!(out.reset_suggested);
        assert!(out.tempo_reliable);
        assert_close(out.phase, 0.05 + 480.0 * 140.0 / (60.0 * SAMPLE_RATE * 4.0));

        // Within tolerance: no reset
        let out = driver.step(tempo_only(140.005), 480);
        assert!(!out.reset_suggested);
        assert!(out.phase > before);
    }

    #[test]
    fn test_loop_length_change_suggests_reset() {
        let mut driver = Driver::new();
        for _ in 0..10 {
            driver.step(HostTransport::unknown(), 480);
        }
        driver.beats_in_loop = 8.0;
        let out = driver.step(HostTransport::unknown(), 480);
        assert!(out.reset_suggested);
        assert_close(out.phase, 0.05 + 0.0025);
    }

    #[test]
    fn test_host_time_jump_suggests_reset() {
        let mut driver = Driver::new();
        let at = |driver: &Driver, time: i64| {
            HostTransport::playing(driver.host_beats(), BPM).with_time(time, SAMPLE_RATE)
        };
        driver.step(at(&driver, 0), 480);
        let out = driver.step(at(&driver, 480), 480);
        assert!(!out.reset_suggested);
        let out = driver.step(at(&driver, 960), 480);
        assert!(!out.reset_suggested);

        let out = driver.step(at(&driver, 48_000), 480);
        assert!(out.reset_suggested);
        let out = driver.step(at(&driver, 48_480), 480);
        assert!(!out.reset_suggested);
    }

    #[test]
    fn test_unknown_transport_runs_at_default_tempo() {
        let mut driver = Driver::new();
        let mut out = ClockOutput::default();
        for _ in 0..10 {
            out = driver.step(HostTransport::unknown(), 480);
        }
        assert!(out.is_playing);
        assert!(!out.phase_reliable);
        assert!(!out.tempo_reliable);
        assert_eq!(out.tempo_bpm, DEFAULT_TEMPO_BPM);
        assert_close(out.phase, 0.05);
    }
}
