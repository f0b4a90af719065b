//! Built-in transport for live input
//!
//! Captured audio carries no musical position, so the monitor plays a steady
//! transport from the first captured sample.

use loopscope_core::HostTransport;

/// Steady transport counting captured samples
#[derive(Debug, Clone)]
pub struct InputTransport {
    tempo_bpm: Option<f64>,
    sample_rate: f64,
    position: u64,
}

impl InputTransport {
    pub fn new(tempo_bpm: Option<f64>, sample_rate: f64) -> Self {
        Self {
            tempo_bpm: tempo_bpm.filter(|bpm| bpm.is_finite() && *bpm > 0.0),
            sample_rate,
            position: 0,
        }
    }

    /// Transport for the next block of `frames`, then advance past it
    #[inline]
    pub fn next_block(&mut self, frames: usize) -> HostTransport {
        let position = self.position;
        self.position += frames as u64;

        match self.tempo_bpm {
            Some(bpm) => {
                let beats = position as f64 * bpm / (60.0 * self.sample_rate);
                HostTransport::playing(beats, bpm).with_time(position as i64, self.sample_rate)
            }
            None => HostTransport::unknown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_advances_with_blocks() {
        let mut transport = InputTransport::new(Some(120.0), 48_000.0);
        let first = transport.next_block(24_000);
        assert_eq!(first.position_beats, Some(0.0));
        let second = transport.next_block(24_000);
        assert_eq!(second.position_beats, Some(1.0));
        assert_eq!(second.time_samples, Some(24_000));
        assert_eq!(second.time_seconds, Some(0.5));
    }

    #[test]
    fn test_without_tempo_reports_nothing() {
        let mut transport = InputTransport::new(None, 48_000.0);
        assert_eq!(transport.next_block(512), HostTransport::unknown());
        let mut transport = InputTransport::new(Some(0.0), 48_000.0);
        assert_eq!(transport.next_block(512).position_beats, None);
    }
}
