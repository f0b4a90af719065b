//! Loop phase clocks
//!
//! - [`TransportClock`]: phase from the host's beat position and tempo
//! - [`FreeRunClock`]: phase from the write head in free time mode
//! - [`project_phase`]: render-side interpolation between snapshots

mod free_run;
mod loop_clock;
mod projection;
mod transport;

pub use free_run::FreeRunClock;
pub use loop_clock::{
    wrap_signed, ClockInput, ClockOutput, ClockState, ClockTuning, TransportClock,
    DEFAULT_JITTER_TOLERANCE, DEFAULT_SEEK_DISTANCE, DEFAULT_TEMPO_TOLERANCE_BPM,
};
pub use projection::{project_phase, MAX_PROJECTION};
pub(crate) use projection::advance_phase;
pub use transport::HostTransport;
