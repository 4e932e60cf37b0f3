//! # Shadow Read Facade
//!
//! The only view of the world an outbound encoder may use.
//!
//! ```text
//! encoder worker ──shadow_value(pos)──► ShadowReader ──► Section
//!                                                         │
//!                          hidden? disguise_for(real, y) ◄┘ : real
//! ```
//!
//! Cheap to clone; one per encoder worker is fine. Never waits on mask
//! computation: the mutation thread only holds a section lock for the
//! duration of a pointer swap.

use std::sync::Arc;

use crate::config::ShadowPolicy;
use crate::mask::MaskSnapshot;
use crate::voxel::{ChunkCoord, VoxelPos, VoxelType};
use crate::world::ShadowWorld;

/// Read-only access to shadow values.
#[derive(Clone)]
pub struct ShadowReader {
    world: Arc<ShadowWorld>,
    policy: Arc<ShadowPolicy>,
}

impl ShadowReader {
    /// Creates a reader.
    #[must_use]
    pub fn new(world: Arc<ShadowWorld>, policy: Arc<ShadowPolicy>) -> Self {
        Self { world, policy }
    }

    /// The value an uninformed client should see at `pos`.
    ///
    /// Returns `None` if the chunk is not resident or `pos` is outside the
    /// world's vertical range.
    #[must_use]
    pub fn shadow_value(&self, pos: VoxelPos) -> Option<VoxelType> {
        let addr = self.world.address(pos)?;
        let chunk = self.world.chunk_at(addr.chunk)?;
        let section = chunk.section_at(addr.slot)?;
        Some(section.shadow_type(addr.index, self.policy.disguises()))
    }

    /// The real value at `pos`. Only for trusted consumers.
    #[must_use]
    pub fn real_value(&self, pos: VoxelPos) -> Option<VoxelType> {
        self.world.real_type_at(pos)
    }

    /// Whether `pos` is currently hidden.
    #[must_use]
    pub fn is_hidden(&self, pos: VoxelPos) -> Option<bool> {
        let addr = self.world.address(pos)?;
        let chunk = self.world.chunk_at(addr.chunk)?;
        let section = chunk.section_at(addr.slot)?;
        Some(section.is_hidden(addr.index))
    }

    /// Shadow values of a whole section, for chunk data encoding.
    #[must_use]
    pub fn shadow_section(&self, coord: ChunkCoord, slot: usize) -> Option<Vec<VoxelType>> {
        let chunk = self.world.chunk_at(coord)?;
        let section = chunk.section_at(slot)?;
        Some(section.shadow_types(self.policy.disguises()))
    }

    /// Published masks of a chunk, bottom first. `None` if not resident.
    #[must_use]
    pub fn mask_snapshots(&self, coord: ChunkCoord) -> Option<Vec<(usize, MaskSnapshot)>> {
        self.world.chunk_at(coord).map(|c| c.mask_snapshots())
    }

    /// Sections per chunk.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.world.shape().section_count
    }
}

impl std::fmt::Debug for ShadowReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowReader")
            .field("world", &self.world)
            .finish_non_exhaustive()
    }
}
