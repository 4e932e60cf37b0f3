//! # Shadow Masks
//!
//! One bit per voxel of a section, `1 = hidden`.
//!
//! ## Publication Model
//!
//! A `ShadowMask` is never modified after construction. Clearing bits
//! produces a NEW mask which the owning section swaps in atomically:
//!
//! ```text
//! mutation thread:   old ──with_bits_cleared──► new ──publish──► section
//! encoder threads:   section ──snapshot──► Arc<ShadowMask> (old or new, never half)
//! ```
//!
//! A section with no hidden voxels left stores no mask at all (`None`).

use std::sync::Arc;

use crate::error::{ShadowError, ShadowResult};
use crate::voxel::{MASK_WORDS, VOXELS_PER_SECTION, WORD_BITS};

/// Published mask state of a section. `None` means fully revealed.
pub type MaskSnapshot = Option<Arc<ShadowMask>>;

/// Immutable per-section hidden bitset.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShadowMask {
    words: Box<[u64]>,
}

impl ShadowMask {
    /// A mask with every voxel revealed.
    #[must_use]
    pub fn revealed() -> Self {
        Self {
            words: vec![0u64; MASK_WORDS].into_boxed_slice(),
        }
    }

    /// Builds a mask from a per-index predicate.
    #[must_use]
    pub fn from_fn(mut hidden: impl FnMut(usize) -> bool) -> Self {
        let mut words = vec![0u64; MASK_WORDS];
        for index in 0..VOXELS_PER_SECTION {
            if hidden(index) {
                words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
            }
        }
        Self {
            words: words.into_boxed_slice(),
        }
    }

    /// Rebuilds a mask from its exported words.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::MaskLength`] unless exactly [`MASK_WORDS`]
    /// words are supplied.
    pub fn from_words(words: Vec<u64>) -> ShadowResult<Self> {
        if words.len() != MASK_WORDS {
            return Err(ShadowError::MaskLength {
                expected: MASK_WORDS,
                found: words.len(),
            });
        }
        Ok(Self {
            words: words.into_boxed_slice(),
        })
    }

    /// Exported words, bit `i` at word `i / 64`, position `i % 64`.
    #[inline]
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns true if the voxel at `index` is hidden.
    ///
    /// Indices outside the section are never hidden.
    #[inline]
    #[must_use]
    pub fn is_hidden(&self, index: usize) -> bool {
        index < VOXELS_PER_SECTION && (self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
    }

    /// Returns a copy with exactly one bit cleared.
    #[must_use]
    pub fn with_bit_cleared(&self, index: usize) -> Self {
        self.with_bits_cleared(&[index])
    }

    /// Returns a copy with every listed bit cleared.
    ///
    /// Out-of-range indices are ignored. No bit is ever set.
    #[must_use]
    pub fn with_bits_cleared(&self, indices: &[usize]) -> Self {
        let mut words = self.words.clone();
        for &index in indices {
            if index < VOXELS_PER_SECTION {
                words[index / WORD_BITS] &= !(1u64 << (index % WORD_BITS));
            }
        }
        Self { words }
    }

    /// Bitwise AND with another mask. The result hides a voxel only if both do.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let words = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| a & b)
            .collect();
        Self { words }
    }

    /// Returns true if no voxel is hidden.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of hidden voxels.
    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates the local indices of hidden voxels in ascending order.
    pub fn iter_hidden(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| (word >> bit) & 1 == 1)
                .map(move |bit| w * WORD_BITS + bit)
        })
    }

    /// Wraps the mask for publication, collapsing an empty mask to `None`.
    #[must_use]
    pub fn into_snapshot(self) -> MaskSnapshot {
        if self.is_empty() {
            None
        } else {
            Some(Arc::new(self))
        }
    }
}

impl std::fmt::Debug for ShadowMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowMask")
            .field("hidden", &self.hidden_count())
            .finish()
    }
}
