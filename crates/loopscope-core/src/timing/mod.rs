//! Window timing: sync divisions, free durations and their resolution

mod window;

pub use window::{
    division, resolve_window, ResolvedWindow, SyncDivision, TimeMode, DEFAULT_DIVISION_INDEX,
    DEFAULT_FREE_MS, MAX_FREE_MS, MIN_FREE_MS, SYNC_DIVISIONS,
};
