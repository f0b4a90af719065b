//! Sample history shared between the audio callback and the render thread

mod ring;
mod window;

pub use ring::{
    HistoryLayout, SampleHistory, DEFAULT_HISTORY_SECONDS, MAX_HISTORY_FRAMES, MIN_HISTORY_FRAMES,
};
pub use window::{ColumnPeak, SampleWindow};
