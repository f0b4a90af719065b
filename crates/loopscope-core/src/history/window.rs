//! Sample windows copied out of the history for rendering

use crate::types::{ChannelView, Sample};

/// A contiguous run of history, copied out for the render thread
///
/// Stored planar (`channels × frames`). `start_offset` is the absolute sample
/// index of the first frame, counted since the store was configured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleWindow {
    channels: usize,
    frames: usize,
    start_offset: u64,
    data: Vec<Sample>,
}

/// Min/max of one display column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnPeak {
    pub min: Sample,
    pub max: Sample,
}

impl ColumnPeak {
    /// Largest absolute excursion in the column
    #[inline]
    pub fn peak(&self) -> Sample {
        self.min.abs().max(self.max.abs())
    }
}

impl SampleWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize for a new copy, keeping the allocation when it is large enough
    pub(crate) fn prepare(&mut self, channels: usize, frames: usize, start_offset: u64) {
        self.channels = channels;
        self.frames = frames;
        self.start_offset = start_offset;
        self.data.clear();
        self.data.resize(channels * frames, 0.0);
    }

    #[inline]
    pub(crate) fn channel_mut(&mut self, channel: usize) -> &mut [Sample] {
        let frames = self.frames;
        &mut self.data[channel * frames..(channel + 1) * frames]
    }

    /// Number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames per channel
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Whether the window holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Absolute offset of the first frame
    #[inline]
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Absolute offset one past the last frame
    #[inline]
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.frames as u64
    }

    /// Samples of one channel. Out-of-range channels read the last channel.
    pub fn channel(&self, channel: usize) -> &[Sample] {
        if self.channels == 0 {
            return &[];
        }
        let ch = channel.min(self.channels - 1);
        &self.data[ch * self.frames..(ch + 1) * self.frames]
    }

    /// Iterate the window as seen through a channel view
    pub fn view(&self, view: ChannelView) -> impl Iterator<Item = Sample> + '_ {
        let left = self.channel(0);
        let right = self.channel(1);
        left.iter()
            .zip(right.iter())
            .map(move |(&l, &r)| view.mix(l, r))
    }

    /// Reduce the window to `columns` min/max pairs for drawing
    ///
    /// Columns are spread evenly over the window; when there are more columns
    /// than frames, some columns repeat a single frame.
    pub fn column_peaks(&self, view: ChannelView, columns: usize) -> Vec<ColumnPeak> {
        if columns == 0 || self.is_empty() {
            return Vec::new();
        }

        let mixed: Vec<Sample> = self.view(view).collect();
        let frames = mixed.len();
        (0..columns)
            .map(|column| {
                let start = column * frames / columns;
                let end = ((column + 1) * frames / columns).max(start + 1).min(frames);
                let slice = &mixed[start.min(frames - 1)..end];
                let (min, max) = slice
                    .iter()
                    .fold((Sample::MAX, Sample::MIN), |(lo, hi), &s| (lo.min(s), hi.max(s)));
                ColumnPeak { min, max }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_window(left: &[Sample], right: &[Sample]) -> SampleWindow {
        let mut window = SampleWindow::new();
        window.prepare(2, left.len(), 100);
        window.channel_mut(0).copy_from_slice(left);
        window.channel_mut(1).copy_from_slice(right);
        window
    }

    #[test]
    fn test_offsets() {
        let window = stereo_window(&[0.0; 4], &[0.0; 4]);
        assert_eq!(window.start_offset(), 100);
        assert_eq!(window.end_offset(), 104);
        assert_eq!(window.frames(), 4);
    }

    #[test]
    fn test_side_view() {
        let window = stereo_window(&[1.0, 0.5], &[-1.0, 0.5]);
        let side: Vec<Sample> = window.view(ChannelView::Side).collect();
        assert_eq!(side, vec![1.0, 0.0]);
    }

    #[test]
    fn test_mono_window_views_repeat_channel() {
        let mut window = SampleWindow::new();
        window.prepare(1, 2, 0);
        window.channel_mut(0).copy_from_slice(&[0.25, -0.25]);
        let right: Vec<Sample> = window.view(ChannelView::Right).collect();
        assert_eq!(right, vec![0.25, -0.25]);
    }

    #[test]
    fn test_column_peaks() {
        let left = [0.0, 1.0, -0.5, 0.25];
        let window = stereo_window(&left, &left);
        let peaks = window.column_peaks(ChannelView::Left, 2);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0], ColumnPeak { min: 0.0, max: 1.0 });
        assert_eq!(peaks[1], ColumnPeak { min: -0.5, max: 0.25 });
        assert_eq!(peaks[1].peak(), 0.5);
    }

    #[test]
    fn test_more_columns_than_frames() {
        let window = stereo_window(&[0.5, -0.5], &[0.5, -0.5]);
        let peaks = window.column_peaks(ChannelView::Mono, 5);
        assert_eq!(peaks.len(), 5);
        assert!(peaks.iter().all(|p| p.peak() == 0.5));
    }
}
