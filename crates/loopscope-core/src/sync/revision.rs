//! Even/odd revision counter (seqlock) for single-writer, multi-reader data
//!
//! The writer bumps the counter to odd before touching shared data and back to
//! even when done. Readers never write anything shared: they copy the data
//! between two loads of the counter and keep the copy only if the counter was
//! even and unchanged. All guarded data lives in atomics, so a torn copy is
//! merely discarded, never undefined behaviour.
//!
//! ```text
//!   writer:  rev=odd ─fence(Release)─ stores ... ─ rev=even (Release)
//!   reader:  s1=rev (Acquire) ─ loads ... ─fence(Acquire)─ s2=rev ─ s1==s2 && even?
//! ```

use std::sync::atomic::{fence, AtomicU64, Ordering};

use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of read attempts before a reader gives up
pub const DEFAULT_READ_ATTEMPTS: u32 = 16;

/// How many times a reader may retry before reporting contention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryBudget {
    attempts: u32,
}

impl RetryBudget {
    /// Budget of `attempts` tries (at least one)
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    /// Number of attempts allowed
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_READ_ATTEMPTS)
    }
}

/// The writer kept the counter moving for the whole retry budget
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("revision still changing after {attempts} attempts")]
pub struct Contended {
    pub attempts: u32,
}

/// Revision counter shared by one writer and any number of readers
///
/// Padded to its own cache line so reader polling does not false-share with
/// the data it guards.
#[derive(Debug, Default)]
pub struct Revision {
    counter: CachePadded<AtomicU64>,
}

impl Revision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value (odd while a write is in progress)
    #[inline]
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Start a write. The counter returns to even when the guard drops.
    ///
    /// Only one writer may exist; overlapping guards corrupt the protocol.
    #[inline]
    pub fn begin_write(&self) -> WriteGuard<'_> {
        let rev = self.counter.load(Ordering::Relaxed);
        debug_assert!(rev & 1 == 0, "revision write already in progress");
        self.counter.store(rev.wrapping_add(1), Ordering::Relaxed);
        // Orders the odd store before every data store that follows
        fence(Ordering::Release);
        WriteGuard { revision: self }
    }

    /// Run `copy` until it observes a stable, even revision
    ///
    /// `copy` must only read shared state (atomics) and may run several
    /// times. Spinning on an odd counter consumes an attempt too, so the
    /// total work is bounded by the budget.
    #[inline]
    pub fn read<R>(&self, budget: RetryBudget, mut copy: impl FnMut() -> R) -> Result<R, Contended> {
        let attempts = budget.attempts();
        for _ in 0..attempts {
            let before = self.counter.load(Ordering::Acquire);
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let value = copy();

            fence(Ordering::Acquire);
            let after = self.counter.load(Ordering::Relaxed);
            if before == after {
                return Ok(value);
            }
            std::hint::spin_loop();
        }
        Err(Contended { attempts })
    }
}

/// Marks a write in progress; publishing happens on drop
pub struct WriteGuard<'a> {
    revision: &'a Revision,
}

impl Drop for WriteGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        let rev = self.revision.counter.load(Ordering::Relaxed);
        self.revision
            .counter
            .store(rev.wrapping_add(1), Ordering::Release);
    }
}
