//! Lock-free publication primitives shared by the history store and the
//! frame snapshot
//!
//! - [`Revision`]: even/odd revision counter with bounded reader retries
//! - [`SeqCell`]: a whole `Pod` value published through a revision

mod revision;
mod seq_cell;

pub use revision::{Contended, Revision, RetryBudget, WriteGuard, DEFAULT_READ_ATTEMPTS};
pub use seq_cell::SeqCell;
