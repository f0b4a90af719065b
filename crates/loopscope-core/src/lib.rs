//! Loopscope Core - Real-time analysis bridge for loop waveform display
//!
//! The audio callback owns a [`Producer`] and the render thread owns one or
//! more [`Consumer`]s. Between them sit a wait-free sample history and a
//! published per-block frame snapshot, both guarded by revision counters so
//! the audio thread never blocks, locks or allocates.

pub mod bridge;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod sync;
pub mod timing;
pub mod types;

pub use bridge::{bridge, Consumer, FrameSnapshot, Producer, RenderFrame, TransportSnapshot};
pub use clock::{project_phase, HostTransport};
pub use config::BridgeConfig;
pub use error::{ConfigError, FrameError, ReadError};
pub use history::SampleWindow;
pub use timing::{resolve_window, ResolvedWindow, TimeMode};
pub use types::*;
