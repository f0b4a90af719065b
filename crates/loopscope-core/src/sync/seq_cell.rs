//! Published value with copy-and-retry reads
//!
//! `SeqCell<T>` stores a plain-old-data value as a run of atomic words behind
//! a [`Revision`]. The writer replaces the whole value at once; readers get
//! either a value that was published as a unit or a `Contended` error, never a
//! mix of two publications.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::Pod;

use super::revision::{Contended, Revision, RetryBudget};

const WORD: usize = std::mem::size_of::<u32>();

/// Single-writer, multi-reader cell for a `Pod` value
///
/// `T` must be a multiple of four bytes; `bytemuck::Pod` guarantees every bit
/// pattern is a valid `T`, so a discarded torn copy is harmless.
pub struct SeqCell<T> {
    revision: Revision,
    words: Box<[AtomicU32]>,
    _value: PhantomData<fn() -> T>,
}

impl<T: Pod> SeqCell<T> {
    /// Create a cell holding `value` (allocates; not for the audio thread)
    pub fn new(value: T) -> Self {
        assert!(
            std::mem::size_of::<T>() % WORD == 0,
            "SeqCell value size must be a multiple of {} bytes",
            WORD
        );
        let words = bytemuck::bytes_of(&value)
            .chunks_exact(WORD)
            .map(|chunk| AtomicU32::new(u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
            .collect();
        Self {
            revision: Revision::new(),
            words,
            _value: PhantomData,
        }
    }

    /// Publish a new value (single writer; wait-free, no allocation)
    #[inline]
    pub fn write(&self, value: &T) {
        let _guard = self.revision.begin_write();
        for (word, chunk) in self
            .words
            .iter()
            .zip(bytemuck::bytes_of(value).chunks_exact(WORD))
        {
            word.store(
                u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                Ordering::Relaxed,
            );
        }
    }

    /// Copy out the latest complete value
    #[inline]
    pub fn read(&self, budget: RetryBudget) -> Result<T, Contended> {
        self.revision.read(budget, || {
            let mut out = T::zeroed();
            for (chunk, word) in bytemuck::bytes_of_mut(&mut out)
                .chunks_exact_mut(WORD)
                .zip(self.words.iter())
            {
                chunk.copy_from_slice(&word.load(Ordering::Relaxed).to_ne_bytes());
            }
            out
        })
    }

    /// Revision counter value; advances by two per publication
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision.current()
    }
}

impl<T: Pod + Default> Default for SeqCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
