//! # Mask Archives
//!
//! Masks are reconstructible from voxel data, so persisting them is only an
//! optimisation: an archived mask lets a reloaded chunk remember voxels that
//! were revealed in an earlier session.
//!
//! ## Format
//!
//! ```text
//! LZ4( section_count: u32 LE
//!      repeated section_count times:
//!          present: u8 (0 = fully revealed, 1 = words follow)
//!          words:   64 × u64 (host byte order) if present )
//! ```
//!
//! Archives are host-local caches, never sent over the wire.

use bytemuck::cast_slice;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::chunk::Chunk;
use crate::error::{ShadowError, ShadowResult};
use crate::mask::{MaskSnapshot, ShadowMask};
use crate::voxel::{ChunkCoord, MASK_WORDS};

const WORD_BYTES: usize = std::mem::size_of::<u64>();

/// Compressed masks of one chunk column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskArchive {
    coord: ChunkCoord,
    data: Vec<u8>,
}

impl MaskArchive {
    /// Archives every section mask of a chunk.
    #[must_use]
    pub fn capture(chunk: &Chunk) -> Self {
        let masks: Vec<MaskSnapshot> = chunk
            .mask_snapshots()
            .into_iter()
            .map(|(_, mask)| mask)
            .collect();
        Self::from_masks(chunk.coord(), &masks)
    }

    /// Archives an explicit list of section masks, bottom first.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_masks(coord: ChunkCoord, masks: &[MaskSnapshot]) -> Self {
        let mut raw = Vec::with_capacity(4 + masks.len() * (1 + MASK_WORDS * WORD_BYTES));
        raw.extend_from_slice(&(masks.len() as u32).to_le_bytes());
        for mask in masks {
            match mask {
                Some(mask) => {
                    raw.push(1);
                    raw.extend_from_slice(cast_slice::<u64, u8>(mask.words()));
                }
                None => raw.push(0),
            }
        }
        Self {
            coord,
            data: compress_prepend_size(&raw),
        }
    }

    /// Wraps previously stored bytes.
    #[must_use]
    pub fn from_bytes(coord: ChunkCoord, data: Vec<u8>) -> Self {
        Self { coord, data }
    }

    /// Chunk the archive belongs to.
    #[inline]
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Compressed bytes, ready to store.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decodes the archived masks, bottom first.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::ArchiveCorrupt`] on bad compression, truncated
    /// data, trailing bytes or an unknown presence flag.
    pub fn masks(&self) -> ShadowResult<Vec<MaskSnapshot>> {
        let raw = decompress_size_prepended(&self.data)
            .map_err(|e| ShadowError::ArchiveCorrupt(e.to_string()))?;

        let truncated = || ShadowError::ArchiveCorrupt("truncated archive".into());
        let count_bytes: [u8; 4] = raw
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(truncated)?;
        let count = u32::from_le_bytes(count_bytes) as usize;

        let mut pos = 4;
        let mut masks = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            let flag = *raw.get(pos).ok_or_else(truncated)?;
            pos += 1;
            match flag {
                0 => masks.push(None),
                1 => {
                    let end = pos + MASK_WORDS * WORD_BYTES;
                    let bytes = raw.get(pos..end).ok_or_else(truncated)?;
                    let words = bytes
                        .chunks_exact(WORD_BYTES)
                        .map(bytemuck::try_pod_read_unaligned::<u64>)
                        .collect::<Result<Vec<u64>, _>>()
                        .map_err(|e| ShadowError::ArchiveCorrupt(format!("{e:?}")))?;
                    masks.push(ShadowMask::from_words(words)?.into_snapshot());
                    pos = end;
                }
                other => {
                    return Err(ShadowError::ArchiveCorrupt(format!(
                        "unknown presence flag {other}"
                    )))
                }
            }
        }

        if pos != raw.len() {
            return Err(ShadowError::ArchiveCorrupt(format!(
                "{} trailing bytes",
                raw.len() - pos
            )));
        }
        Ok(masks)
    }
}
