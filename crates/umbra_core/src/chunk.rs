//! # Chunk Columns
//!
//! A chunk is a vertical stack of sections sharing a 16x16 footprint.
//! Sections are created with the chunk and dropped with it.

use crate::config::WorldShape;
use crate::error::{ShadowError, ShadowResult};
use crate::mask::MaskSnapshot;
use crate::section::Section;
use crate::voxel::{ChunkCoord, VoxelType, SECTION_SIZE, VOXELS_PER_SECTION};

/// A loaded chunk column.
pub struct Chunk {
    coord: ChunkCoord,
    sections: Box<[Section]>,
}

impl Chunk {
    /// Builds a chunk from its real voxel types.
    ///
    /// `voxels` holds `shape.section_count` sections back to back, bottom
    /// first, each in local index order. Masks start fully revealed; the
    /// update engine seeds them.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::VoxelDataLength`] if `voxels` does not cover the
    /// whole column.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn from_voxels(coord: ChunkCoord, shape: WorldShape, voxels: &[VoxelType]) -> ShadowResult<Self> {
        if voxels.len() != shape.voxels_per_chunk() {
            return Err(ShadowError::VoxelDataLength {
                expected: shape.voxels_per_chunk(),
                found: voxels.len(),
            });
        }

        let sections = voxels
            .chunks_exact(VOXELS_PER_SECTION)
            .enumerate()
            .map(|(slot, data)| {
                let base_y = (shape.min_section + slot as i32) * SECTION_SIZE as i32;
                Section::new(slot, base_y, data)
            })
            .collect();

        Ok(Self { coord, sections })
    }

    /// Chunk coordinate.
    #[inline]
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Section at a vertical slot.
    #[inline]
    #[must_use]
    pub fn section_at(&self, slot: usize) -> Option<&Section> {
        self.sections.get(slot)
    }

    /// All sections, bottom first.
    #[inline]
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Real voxel type at a slot and local index. Missing sections read as air.
    #[inline]
    #[must_use]
    pub fn real_type(&self, slot: usize, index: usize) -> VoxelType {
        self.section_at(slot).map_or(VoxelType::AIR, |s| s.real_type(index))
    }

    /// Published masks of every section, bottom first.
    #[must_use]
    pub fn mask_snapshots(&self) -> Vec<(usize, MaskSnapshot)> {
        self.sections
            .iter()
            .map(|s| (s.slot(), s.current_mask_snapshot()))
            .collect()
    }

    /// Hidden voxels across the column.
    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.sections.iter().map(Section::hidden_count).sum()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("sections", &self.sections.len())
            .field("hidden", &self.hidden_count())
            .finish()
    }
}
