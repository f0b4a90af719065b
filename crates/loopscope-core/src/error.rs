//! Error types for the analysis bridge
//!
//! Nothing here is ever returned on the audio thread. Read-side errors are the
//! "unavailable" outcome: the renderer skips a frame and tries again on its
//! next tick.

use thiserror::Error;

/// Errors raised while (re)configuring the bridge
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Sample rate is zero, negative or not a number
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    /// Channel count outside `1..=max`
    #[error("Invalid channel count {channels} (supported: 1..={max})")]
    InvalidChannels { channels: usize, max: usize },

    /// Requested history does not fit the storage allocated at construction
    #[error("History of {requested} frames exceeds allocated capacity of {allocated} frames")]
    CapacityExceeded { requested: usize, allocated: usize },
}

/// Reasons a sample window could not be read
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// The store has not been configured yet (or was released)
    #[error("Sample history is not configured")]
    NotConfigured,

    /// Nothing has been written since the last configure/clear
    #[error("No samples written yet")]
    NoHistory,

    /// The writer kept the revision moving for every attempt
    #[error("No consistent read after {attempts} attempts")]
    Contended { attempts: u32 },
}

/// Reasons a render frame could not be assembled
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The audio pipeline has not published a block yet
    #[error("No frame published yet")]
    NotPublished,

    /// The snapshot kept changing for every attempt
    #[error("No consistent snapshot after {attempts} attempts")]
    Contended { attempts: u32 },

    /// The snapshot was fine but the matching samples were not
    #[error("Sample window unavailable: {0}")]
    Window(#[from] ReadError),
}

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for history reads
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for render frames
pub type FrameResult<T> = Result<T, FrameError>;
