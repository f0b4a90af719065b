//! Circular multi-channel sample history
//!
//! One writer (the audio callback, through the `Producer`) appends blocks;
//! any number of readers copy windows out. The writer never waits: each block
//! is bracketed by a [`Revision`] write, and readers that overlap it retry up
//! to their budget and then report `Contended`.
//!
//! Storage is allocated once for the largest layout the bridge supports, so
//! reconfiguring at a new sample rate never reallocates and can safely overlap
//! a reader (which just fails validation).

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::error::{ConfigError, ConfigResult, ReadError, ReadResult};
use crate::sync::{Revision, RetryBudget};
use crate::types::{AudioBlock, Sample, MAX_CHANNELS};

use super::SampleWindow;

/// Smallest history kept per channel (frames)
pub const MIN_HISTORY_FRAMES: usize = 65_536;

/// Largest history kept per channel (frames)
pub const MAX_HISTORY_FRAMES: usize = 2 * 1024 * 1024;

/// Default amount of audio kept in the history
pub const DEFAULT_HISTORY_SECONDS: f64 = 9.0;

/// Channel count and per-channel capacity of a configured history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLayout {
    pub channels: usize,
    pub capacity: usize,
}

impl HistoryLayout {
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self { channels, capacity }
    }

    /// Layout holding `seconds` of audio at `sample_rate`, clamped to
    /// [`MIN_HISTORY_FRAMES`, `MAX_HISTORY_FRAMES`]
    pub fn for_sample_rate(channels: usize, sample_rate: f64, seconds: f64) -> Self {
        let wanted = (sample_rate.max(0.0) * seconds.max(0.0)).ceil();
        let capacity = if wanted.is_finite() {
            (wanted as usize).clamp(MIN_HISTORY_FRAMES, MAX_HISTORY_FRAMES)
        } else {
            MAX_HISTORY_FRAMES
        };
        Self { channels, capacity }
    }

    /// Total samples across all channels
    #[inline]
    pub fn samples(&self) -> usize {
        self.channels * self.capacity
    }
}

/// Absolute range of a window that was copied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowSpan {
    start: u64,
    end: u64,
}

/// Wait-free circular sample history
pub struct SampleHistory {
    revision: Revision,
    /// Planar storage: channel `c` occupies `[c * capacity, (c + 1) * capacity)`
    storage: Box<[AtomicU32]>,
    allocated: HistoryLayout,
    channels: AtomicUsize,
    capacity: AtomicUsize,
    write_index: AtomicUsize,
    total_written: AtomicU64,
    budget: RetryBudget,
}

impl SampleHistory {
    /// Allocate storage for at most `allocated` (not configured yet)
    pub fn with_allocation(allocated: HistoryLayout, budget: RetryBudget) -> Self {
        let allocated = HistoryLayout {
            channels: allocated.channels.clamp(1, MAX_CHANNELS),
            capacity: allocated.capacity.max(1),
        };
        log::debug!(
            "Allocating sample history: {} ch x {} frames ({:.1} MiB)",
            allocated.channels,
            allocated.capacity,
            (allocated.samples() * std::mem::size_of::<AtomicU32>()) as f64 / (1024.0 * 1024.0)
        );
        Self {
            revision: Revision::new(),
            storage: (0..allocated.samples()).map(|_| AtomicU32::new(0)).collect(),
            allocated,
            channels: AtomicUsize::new(0),
            capacity: AtomicUsize::new(0),
            write_index: AtomicUsize::new(0),
            total_written: AtomicU64::new(0),
            budget,
        }
    }

    /// Largest layout this store can be configured for
    pub fn allocated(&self) -> HistoryLayout {
        self.allocated
    }

    /// Reset to a new layout and drop all history
    ///
    /// Must be called from the writer's side (pipeline setup/teardown).
    /// Readers that overlap it fail validation instead of seeing a mix.
    pub(crate) fn configure(&self, layout: HistoryLayout) -> ConfigResult<()> {
        if layout.channels == 0 || layout.channels > self.allocated.channels {
            return Err(ConfigError::InvalidChannels {
                channels: layout.channels,
                max: self.allocated.channels,
            });
        }
        if layout.capacity == 0 || layout.capacity > self.allocated.capacity {
            return Err(ConfigError::CapacityExceeded {
                requested: layout.capacity,
                allocated: self.allocated.capacity,
            });
        }

        let _guard = self.revision.begin_write();
        self.channels.store(layout.channels, Ordering::Relaxed);
        self.capacity.store(layout.capacity, Ordering::Relaxed);
        self.reset_contents(layout.samples());
        Ok(())
    }

    /// Drop all history, keeping the layout (pipeline stop)
    pub(crate) fn clear(&self) {
        let used = self.channels.load(Ordering::Relaxed) * self.capacity.load(Ordering::Relaxed);
        let _guard = self.revision.begin_write();
        self.reset_contents(used);
    }

    fn reset_contents(&self, used: usize) {
        for word in &self.storage[..used] {
            word.store(0, Ordering::Relaxed);
        }
        self.write_index.store(0, Ordering::Relaxed);
        self.total_written.store(0, Ordering::Relaxed);
    }

    /// Append a block (single writer; no allocation, no waiting)
    ///
    /// Blocks longer than the capacity keep only their last `capacity` frames,
    /// but the total still advances by the full block length.
    #[inline]
    pub(crate) fn write(&self, block: &AudioBlock<'_>) {
        let frames = block.frames();
        let channels = self.channels.load(Ordering::Relaxed);
        let capacity = self.capacity.load(Ordering::Relaxed);
        if frames == 0 || block.channels() == 0 || channels == 0 || capacity == 0 {
            return;
        }

        let _guard = self.revision.begin_write();

        let skip = frames.saturating_sub(capacity);
        let mut index = (self.write_index.load(Ordering::Relaxed) + skip) % capacity;
        for frame in skip..frames {
            for ch in 0..channels {
                self.storage[ch * capacity + index]
                    .store(block.sample(ch, frame).to_bits(), Ordering::Relaxed);
            }
            index += 1;
            if index == capacity {
                index = 0;
            }
        }

        self.write_index.store(index, Ordering::Relaxed);
        let total = self.total_written.load(Ordering::Relaxed);
        self.total_written
            .store(total + frames as u64, Ordering::Relaxed);
    }

    /// Copy the window of `length` frames ending at `end_exclusive`
    ///
    /// - `length` is clamped to `[1, capacity]`
    /// - `end_exclusive` beyond the total written is clamped down to it
    /// - a window that would reach before the retained history starts at the
    ///   earliest retained frame and is shorter than `length`
    /// - an `end_exclusive` at or before the earliest retained frame reads the
    ///   earliest `length` frames
    pub fn read_window_ending_at(&self, length: usize, end_exclusive: u64) -> ReadResult<SampleWindow> {
        let mut window = SampleWindow::new();
        self.read_window_into(&mut window, length, end_exclusive)?;
        Ok(window)
    }

    /// Copy the most recent `length` frames
    pub fn read_most_recent(&self, length: usize) -> ReadResult<SampleWindow> {
        self.read_window_ending_at(length, u64::MAX)
    }

    /// Same as [`read_window_ending_at`](Self::read_window_ending_at), reusing
    /// `window`'s allocation
    pub fn read_window_into(
        &self,
        window: &mut SampleWindow,
        length: usize,
        end_exclusive: u64,
    ) -> ReadResult<()> {
        let copied = self.revision.read(self.budget, || {
            let channels = self.channels.load(Ordering::Relaxed);
            let capacity = self.capacity.load(Ordering::Relaxed);
            if channels == 0 || capacity == 0 {
                return Err(ReadError::NotConfigured);
            }

            let total = self.total_written.load(Ordering::Relaxed);
            let span = clamp_window(total, capacity as u64, length, end_exclusive)?;
            let frames = (span.end - span.start) as usize;

            window.prepare(channels, frames, span.start);
            for ch in 0..channels {
                let ring = &self.storage[ch * capacity..(ch + 1) * capacity];
                let dest = window.channel_mut(ch);
                let mut index = (span.start % capacity as u64) as usize;
                for sample in dest.iter_mut() {
                    *sample = Sample::from_bits(ring[index].load(Ordering::Relaxed));
                    index += 1;
                    if index == capacity {
                        index = 0;
                    }
                }
            }
            Ok(span)
        });

        match copied {
            Ok(result) => result.map(|_| ()),
            Err(contended) => Err(ReadError::Contended {
                attempts: contended.attempts,
            }),
        }
    }

    /// Configured channel count (0 before configure)
    pub fn channels(&self) -> usize {
        self.channels.load(Ordering::Relaxed)
    }

    /// Configured per-channel capacity (0 before configure)
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Frames written since the last configure/clear
    pub fn total_written(&self) -> u64 {
        self.revision
            .read(self.budget, || self.total_written.load(Ordering::Relaxed))
            .unwrap_or_else(|_| self.total_written.load(Ordering::Relaxed))
    }
}

/// Resolve the absolute window to copy
fn clamp_window(total: u64, capacity: u64, length: usize, end_exclusive: u64) -> ReadResult<WindowSpan> {
    if total == 0 {
        return Err(ReadError::NoHistory);
    }

    let earliest = total.saturating_sub(capacity);
    let wanted = (length.max(1) as u64).min(capacity);

    // An end at or before the retained history reads the earliest frames
    if end_exclusive <= earliest {
        return Ok(WindowSpan {
            start: earliest,
            end: (earliest + wanted).min(total),
        });
    }

    // Otherwise the end is kept and the window shrinks at the old edge
    let end = end_exclusive.min(total);
    let start = end.saturating_sub(wanted).max(earliest);
    Ok(WindowSpan { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(capacity: usize) -> SampleHistory {
        let history = SampleHistory::with_allocation(HistoryLayout::new(2, capacity), RetryBudget::default());
        history.configure(HistoryLayout::new(2, capacity)).unwrap();
        history
    }

    /// Write `count` frames of a ramp continuing from `next`
    fn write_ramp(history: &SampleHistory, next: &mut u32, count: usize) {
        let data: Vec<Sample> = (0..count)
            .flat_map(|i| {
                let v = (*next + i as u32) as Sample;
                [v, -v]
            })
            .collect();
        *next += count as u32;
        history.write(&AudioBlock::Interleaved { data: &data, channels: 2 });
    }

    #[test]
    fn test_unconfigured_is_unavailable() {
        let history = SampleHistory::with_allocation(HistoryLayout::new(2, 16), RetryBudget::default());
        assert_eq!(history.read_most_recent(4), Err(ReadError::NotConfigured));
    }

    #[test]
    fn test_empty_is_unavailable() {
        let history = history(16);
        assert_eq!(history.read_most_recent(4), Err(ReadError::NoHistory));
    }

    #[test]
    fn test_round_trip_shorter_than_capacity() {
        let history = history(16);
        let mut next = 0;
        write_ramp(&history, &mut next, 10);

        let window = history.read_window_ending_at(10, 10).unwrap();
        assert_eq!(window.channel(0), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(window.channel(1)[9], -9.0);
        assert_eq!(window.start_offset(), 0);
    }

    #[test]
    fn test_round_trip_longer_than_capacity() {
        let history = history(8);
        let mut next = 0;
        for _ in 0..5 {
            write_ramp(&history, &mut next, 5);
        }
        assert_eq!(history.total_written(), 25);

        let window = history.read_window_ending_at(100, 25).unwrap();
        assert_eq!(window.frames(), 8);
        assert_eq!(window.channel(0), &[17.0, 18.0, 19.0, 20.0, 21.0, 22.0, 23.0, 24.0]);
    }

    #[test]
    fn test_block_larger_than_capacity_keeps_tail() {
        let history = history(4);
        let mut next = 0;
        write_ramp(&history, &mut next, 10);
        assert_eq!(history.total_written(), 10);
        let window = history.read_most_recent(4).unwrap();
        assert_eq!(window.channel(0), &[6.0, 7.0, 8.0, 9.0]);
        write_ramp(&history, &mut next, 1);
        let window = history.read_most_recent(4).unwrap();
        assert_eq!(window.channel(0), &[7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_end_beyond_total_clamps_down() {
        let history = history(16);
        let mut next = 0;
        write_ramp(&history, &mut next, 6);
        let window = history.read_window_ending_at(3, 1_000).unwrap();
        assert_eq!(window.channel(0), &[3.0, 4.0, 5.0]);
        assert_eq!(window.end_offset(), 6);
    }

    #[test]
    fn test_end_before_history_returns_earliest_window() {
        let history = history(8);
        let mut next = 0;
        write_ramp(&history, &mut next, 20);

        // Earliest retained frame is 12
        let window = history.read_window_ending_at(4, 3).unwrap();
        assert_eq!(window.start_offset(), 12);
        assert_eq!(window.channel(0), &[12.0, 13.0, 14.0, 15.0]);
    }

    #[test]
    fn test_window_reaching_past_history_keeps_end() {
        let history = history(8);
        let mut next = 0;
        write_ramp(&history, &mut next, 20);

        // Retained frames are [12, 20); the start is clamped, the end is not
        let window = history.read_window_ending_at(8, 18).unwrap();
        assert_eq!(window.start_offset(), 12);
        assert_eq!(window.end_offset(), 18);
        assert_eq!(window.channel(0), &[12.0, 13.0, 14.0, 15.0, 16.0, 17.0]);
    }

    #[test]
    fn test_zero_length_reads_one_frame() {
        let history = history(8);
        let mut next = 0;
        write_ramp(&history, &mut next, 3);
        let window = history.read_most_recent(0).unwrap();
        assert_eq!(window.channel(0), &[2.0]);
    }

    #[test]
    fn test_mono_input_fills_both_channels() {
        let history = history(8);
        let mono = [0.5f32, 0.25];
        let planes: [&[Sample]; 1] = [&mono];
        history.write(&AudioBlock::Planar(&planes));
        let window = history.read_most_recent(2).unwrap();
        assert_eq!(window.channel(1), &[0.5, 0.25]);
    }

    #[test]
    fn test_clear_and_reconfigure() {
        let history = history(16);
        let mut next = 0;
        write_ramp(&history, &mut next, 6);
        history.clear();
        assert_eq!(history.total_written(), 0);
        assert_eq!(history.read_most_recent(4), Err(ReadError::NoHistory));

        history.configure(HistoryLayout::new(1, 4)).unwrap();
        assert_eq!(history.channels(), 1);
        assert_eq!(history.capacity(), 4);
        assert!(matches!(
            history.configure(HistoryLayout::new(2, 17)),
            Err(ConfigError::CapacityExceeded { .. })
        ));
        assert!(matches!(
            history.configure(HistoryLayout::new(3, 4)),
            Err(ConfigError::InvalidChannels { .. })
        ));
    }

    #[test]
    fn test_read_during_write_reports_contention() {
        let history = SampleHistory::with_allocation(HistoryLayout::new(2, 16), RetryBudget::new(3));
        history.configure(HistoryLayout::new(2, 16)).unwrap();
        let mut next = 0;
        write_ramp(&history, &mut next, 4);

        // A writer that never finishes its block
        let _guard = history.revision.begin_write();
        assert_eq!(history.read_most_recent(4), Err(ReadError::Contended { attempts: 3 }));
    }

    #[test]
    fn test_layout_for_sample_rate() {
        assert_eq!(HistoryLayout::for_sample_rate(2, 48000.0, 9.0).capacity, 432_000);
        assert_eq!(HistoryLayout::for_sample_rate(2, 1000.0, 9.0).capacity, MIN_HISTORY_FRAMES);
        assert_eq!(HistoryLayout::for_sample_rate(2, 768_000.0, 9.0).capacity, MAX_HISTORY_FRAMES);
    }

    #[test]
    fn test_concurrent_reads_are_contiguous() {
        let history = history(4096);
        let blocks = 3_000;
        let block_len = 64;

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut next = 0;
                for _ in 0..blocks {
                    write_ramp(&history, &mut next, block_len);
                    // Leave gaps like a real audio callback does
                    std::thread::yield_now();
                }
            });

            for _ in 0..2 {
                scope.spawn(|| {
                    let mut window = SampleWindow::new();
                    let mut consistent = 0;
                    for _ in 0..5_000 {
                        if history.read_window_into(&mut window, 300, u64::MAX).is_err() {
                            continue;
                        }
                        consistent += 1;
                        let left = window.channel(0);
                        let right = window.channel(1);
                        assert_eq!(left[0], window.start_offset() as Sample);
                        for i in 1..left.len() {
                            assert_eq!(left[i], left[i - 1] + 1.0, "torn window at {}", i);
                            assert_eq!(right[i], -left[i]);
                        }
                    }
                    assert!(consistent > 0);
                });
            }
        });
    }
}
