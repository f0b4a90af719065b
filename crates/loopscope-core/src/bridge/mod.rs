//! Cross-thread analysis bridge
//!
//! ```text
//!  audio callback                              render thread (~60 Hz)
//!  ──────────────                              ──────────────────────
//!  Producer::on_audio_block                    Consumer::request_render_frame
//!    ├─ SampleHistory::write  ──► history ──►    ├─ read snapshot (retry ≤ N)
//!    ├─ clock.process                            └─ read window ending at
//!    └─ frame.write ─────────► snapshot ──►         snapshot end − delay
//! ```
//!
//! Both shared structures use the revision protocol in [`crate::sync`]; the
//! producer never waits on a consumer.

mod consumer;
mod frame;
mod params;
mod producer;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::history::SampleHistory;
use crate::sync::{RetryBudget, SeqCell};

pub use consumer::Consumer;
pub use frame::{FrameSnapshot, RenderFrame, TransportSnapshot};
pub use params::TimeModeAtomics;
pub use producer::Producer;

use frame::RawFrame;

/// State shared by the producer and all consumers
pub(crate) struct BridgeShared {
    history: SampleHistory,
    frame: SeqCell<RawFrame>,
    time_mode: TimeModeAtomics,
    /// Running sample rate (f64 bits, 0 before configure)
    sample_rate: AtomicU64,
    budget: RetryBudget,
    config: BridgeConfig,
}

/// Build a bridge, allocating the history for the largest supported layout
///
/// Call from setup code, never from the audio thread. The producer must be
/// configured before it records anything.
pub fn bridge(config: &BridgeConfig) -> (Producer, Consumer) {
    let budget = config.retry_budget();
    let allocation = config.allocation();
    log::info!(
        "Creating analysis bridge: {} ch, {} frames per channel, {} read attempts",
        allocation.channels,
        allocation.capacity,
        budget.attempts()
    );

    let shared = Arc::new(BridgeShared {
        history: SampleHistory::with_allocation(allocation, budget),
        frame: SeqCell::new(RawFrame::default()),
        time_mode: TimeModeAtomics::default(),
        sample_rate: AtomicU64::new(0),
        budget,
        config: config.clone(),
    });

    (Producer::new(Arc::clone(&shared)), Consumer::new(shared))
}
