//! Text strip renderer
//!
//! Draws the loop as one line of block glyphs, laid out like a static loop
//! display: column `c` always shows loop position `c / columns`, the playhead
//! moves across and overwrites the oldest audio as it goes.

use std::time::Instant;

use loopscope_core::history::ColumnPeak;
use loopscope_core::{Consumer, RenderFrame};

use crate::config::DisplayConfig;

const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const PLAYHEAD: char = '┃';

/// Glyph for a column's peak level
#[inline]
fn level_glyph(peak: &ColumnPeak) -> char {
    let level = (peak.peak().clamp(0.0, 1.0) * (LEVELS.len() - 1) as f32).round() as usize;
    LEVELS[level.min(LEVELS.len() - 1)]
}

/// Lay out oldest-to-newest peaks around the loop with the newest column at
/// `playhead`
pub fn loop_strip(peaks: &[ColumnPeak], playhead: usize) -> String {
    let columns = peaks.len();
    if columns == 0 {
        return String::new();
    }
    let playhead = playhead.min(columns - 1);

    let mut strip = vec![' '; columns];
    for (age, peak) in peaks.iter().enumerate() {
        // Newest peak (age = columns - 1) lands on the playhead
        let column = (playhead + 1 + age) % columns;
        strip[column] = level_glyph(peak);
    }
    strip[playhead] = PLAYHEAD;
    strip.into_iter().collect()
}

/// Polls the consumer and formats one status line per refresh
pub struct StripRenderer {
    consumer: Consumer,
    display: DisplayConfig,
    columns: usize,
    frame: RenderFrame,
    /// When the newest snapshot was first seen
    frame_seen: Instant,
    last_end: u64,
    resets: u64,
}

impl StripRenderer {
    pub fn new(consumer: Consumer, display: &DisplayConfig) -> Self {
        Self {
            consumer,
            display: display.clone(),
            columns: display.columns.max(1),
            frame: RenderFrame::default(),
            frame_seen: Instant::now(),
            last_end: 0,
            resets: 0,
        }
    }

    /// Number of resets seen so far
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Render the current loop, or `None` when no frame is available
    pub fn render(&mut self, now: Instant) -> Option<String> {
        let delay = self.display.delay_samples(self.consumer.sample_rate());
        let window_samples = self.consumer.window_samples();

        if let Err(e) = self
            .consumer
            .render_frame_into(&mut self.frame, window_samples, delay)
        {
            log::debug!("Frame unavailable: {}", e);
            return None;
        }

        if self.frame.transport.history_end != self.last_end {
            self.last_end = self.frame.transport.history_end;
            self.frame_seen = now;
        }
        if self.frame.reset_suggested {
            self.resets += 1;
            log::debug!("Loop reset at history offset {}", self.last_end);
        }

        let phase = self.frame.projected_phase(now.saturating_duration_since(self.frame_seen));
        let peaks = self.frame.window.column_peaks(self.display.view, self.columns);
        let playhead = ((phase * self.columns as f64) as usize).min(self.columns - 1);

        Some(format!(
            "{:>4} │{}│ {:5.3} {:6.1} BPM{}{}",
            self.display.view.name(),
            loop_strip(&peaks, playhead),
            phase,
            self.frame.tempo_used,
            if self.frame.phase_reliable { "" } else { " ~" },
            if self.frame.reset_suggested { " ↺" } else { "" },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopscope_core::config::BridgeConfig;
    use loopscope_core::{bridge, AudioBlock, HostTransport, TimeMode};

    fn peak(level: f32) -> ColumnPeak {
        ColumnPeak {
            min: -level,
            max: level,
        }
    }

    #[test]
    fn test_level_glyphs() {
        assert_eq!(level_glyph(&peak(0.0)), ' ');
        assert_eq!(level_glyph(&peak(1.0)), '█');
        assert_eq!(level_glyph(&peak(4.0)), '█');
        assert_eq!(level_glyph(&peak(0.5)), '▄');
    }

    #[test]
    fn test_newest_column_sits_at_playhead() {
        let peaks = [peak(1.0), peak(0.0), peak(0.0), peak(0.5)];
        // Oldest (full) column lands just after the playhead
        assert_eq!(loop_strip(&peaks, 1), " ┃█ ");
        assert_eq!(loop_strip(&peaks, 3), "█  ┃");
        assert_eq!(loop_strip(&[], 0), "");
    }

    #[test]
    fn test_renders_live_bridge() {
        let config = BridgeConfig::default()
            .with_history_seconds(1.0)
            .with_max_sample_rate(48_000.0);
        let (mut producer, consumer) = bridge(&config);
        producer.configure(48_000.0, 480).unwrap();
        consumer.set_time_mode(TimeMode::Free { ms: 100.0 });

        let display = DisplayConfig {
            columns: 16,
            ..DisplayConfig::default()
        };
        let mut renderer = StripRenderer::new(consumer, &display);
        assert_eq!(renderer.render(Instant::now()), None);

        let data = vec![0.5f32; 960];
        let block = AudioBlock::Interleaved { data: &data, channels: 2 };
        producer.on_audio_block(&block, &HostTransport::unknown());
        assert!(renderer.render(Instant::now()).is_some());
        assert_eq!(renderer.resets(), 1);

        for _ in 0..9 {
            producer.on_audio_block(&block, &HostTransport::unknown());
        }
        let line = renderer.render(Instant::now()).unwrap();
        assert!(line.contains('┃'));
        assert!(line.contains('▄'));
        assert!(line.starts_with(" Mid"));
        assert_eq!(renderer.resets(), 1);
    }
}
