//! Time-mode parameters shared between the UI and the audio callback

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::timing::{TimeMode, DEFAULT_DIVISION_INDEX, DEFAULT_FREE_MS, SYNC_DIVISIONS};

/// Lock-free time-mode parameters
///
/// The UI writes, the audio thread reads once per block. Each field is
/// independent; a block that sees a half-applied change just resolves the
/// window one block early or late.
pub struct TimeModeAtomics {
    /// Tempo-synced (true) or free duration (false)
    pub sync: AtomicBool,
    /// Index into the sync division table
    pub division: AtomicU8,
    /// Free duration in milliseconds (f64 bits)
    pub free_ms: AtomicU64,
}

impl TimeModeAtomics {
    pub fn new(mode: TimeMode) -> Self {
        let params = Self {
            sync: AtomicBool::new(true),
            division: AtomicU8::new(DEFAULT_DIVISION_INDEX as u8),
            free_ms: AtomicU64::new(DEFAULT_FREE_MS.to_bits()),
        };
        params.store(mode);
        params
    }

    /// Apply a mode (lock-free)
    pub fn store(&self, mode: TimeMode) {
        match mode {
            TimeMode::Sync { division } => {
                let index = division.min(SYNC_DIVISIONS.len() - 1) as u8;
                self.division.store(index, Ordering::Relaxed);
                self.sync.store(true, Ordering::Relaxed);
            }
            TimeMode::Free { ms } => {
                self.free_ms.store(ms.to_bits(), Ordering::Relaxed);
                self.sync.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Current mode (lock-free)
    #[inline]
    pub fn load(&self) -> TimeMode {
        if self.sync.load(Ordering::Relaxed) {
            TimeMode::Sync {
                division: self.division.load(Ordering::Relaxed) as usize,
            }
        } else {
            TimeMode::Free {
                ms: f64::from_bits(self.free_ms.load(Ordering::Relaxed)),
            }
        }
    }
}

impl Default for TimeModeAtomics {
    fn default() -> Self {
        Self::new(TimeMode::default())
    }
}
