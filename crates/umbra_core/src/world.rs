//! Resident chunk registry.
//!
//! Thread-safe for concurrent reads from encoder workers while the
//! mutation thread loads and unloads chunks. The map lock is only taken for
//! writing on load/unload; voxel changes go through the sections themselves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::chunk::Chunk;
use crate::config::WorldShape;
use crate::error::{ShadowError, ShadowResult};
use crate::voxel::{ChunkCoord, VoxelPos, VoxelType};

/// Initial map capacity.
const EXPECTED_LOADED_CHUNKS: usize = 1024;

/// Where a voxel lives: chunk, section slot, local index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoxelAddress {
    /// Owning chunk.
    pub chunk: ChunkCoord,
    /// Section slot inside the chunk.
    pub slot: usize,
    /// Index inside the section.
    pub index: usize,
}

/// All chunks currently resident in one world.
pub struct ShadowWorld {
    shape: WorldShape,
    chunks: RwLock<HashMap<ChunkCoord, Arc<Chunk>>>,
}

impl ShadowWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new(shape: WorldShape) -> Self {
        Self {
            shape,
            chunks: RwLock::new(HashMap::with_capacity(EXPECTED_LOADED_CHUNKS)),
        }
    }

    /// Vertical extent of every chunk.
    #[inline]
    #[must_use]
    pub fn shape(&self) -> WorldShape {
        self.shape
    }

    /// Resolves a position to its chunk/slot/index, or `None` outside the
    /// world's vertical range.
    #[inline]
    #[must_use]
    pub fn address(&self, pos: VoxelPos) -> Option<VoxelAddress> {
        let slot = self.shape.slot_of(pos.section_y())?;
        Some(VoxelAddress {
            chunk: pos.chunk(),
            slot,
            index: pos.local_index(),
        })
    }

    /// The chunk at a coordinate, if resident.
    #[inline]
    #[must_use]
    pub fn chunk_at(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.read().get(&coord).cloned()
    }

    /// Returns true if the chunk is resident.
    #[must_use]
    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.read().contains_key(&coord)
    }

    /// Real voxel type at a position, if its chunk is resident.
    #[must_use]
    pub fn real_type_at(&self, pos: VoxelPos) -> Option<VoxelType> {
        let addr = self.address(pos)?;
        let chunk = self.chunk_at(addr.chunk)?;
        Some(chunk.real_type(addr.slot, addr.index))
    }

    /// Makes a chunk resident.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::ChunkAlreadyLoaded`] if the coordinate is taken.
    pub fn insert(&self, chunk: Arc<Chunk>) -> ShadowResult<()> {
        let coord = chunk.coord();
        let mut chunks = self.chunks.write();
        if chunks.contains_key(&coord) {
            return Err(ShadowError::ChunkAlreadyLoaded(coord));
        }
        chunks.insert(coord, chunk);
        Ok(())
    }

    /// Removes a chunk, returning it if it was resident.
    pub fn remove(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.write().remove(&coord)
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// Coordinates of every resident chunk.
    #[must_use]
    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        self.chunks.read().keys().copied().collect()
    }
}

impl std::fmt::Debug for ShadowWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowWorld")
            .field("shape", &self.shape)
            .field("loaded", &self.loaded_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let shape = WorldShape::new(0, 1);
        let world = ShadowWorld::new(shape);
        let mut voxels = vec![VoxelType::STONE; shape.voxels_per_chunk()];
        voxels[VoxelPos::new(17, 2, 3).local_index()] = VoxelType(56);

        let chunk = Chunk::from_voxels(ChunkCoord::new(1, 0), shape, &voxels).unwrap();
        world.insert(Arc::new(chunk)).unwrap();

        assert!(world.is_loaded(ChunkCoord::new(1, 0)));
        assert_eq!(world.real_type_at(VoxelPos::new(17, 2, 3)), Some(VoxelType(56)));
        assert_eq!(world.real_type_at(VoxelPos::new(0, 2, 3)), None);
        assert_eq!(world.real_type_at(VoxelPos::new(17, 16, 3)), None);
    }

    #[test]
    fn test_double_insert_rejected() {
        let shape = WorldShape::new(0, 1);
        let world = ShadowWorld::new(shape);
        let voxels = vec![VoxelType::AIR; shape.voxels_per_chunk()];
        let coord = ChunkCoord::new(0, 0);

        world.insert(Arc::new(Chunk::from_voxels(coord, shape, &voxels).unwrap())).unwrap();
        let again = world.insert(Arc::new(Chunk::from_voxels(coord, shape, &voxels).unwrap()));
        assert_eq!(again, Err(ShadowError::ChunkAlreadyLoaded(coord)));

        assert!(world.remove(coord).is_some());
        assert_eq!(world.loaded_count(), 0);
    }

    #[test]
    fn test_address_outside_world() {
        let world = ShadowWorld::new(WorldShape::new(-4, 24));
        assert!(world.address(VoxelPos::new(0, -65, 0)).is_none());
        assert!(world.address(VoxelPos::new(0, 320, 0)).is_none());
        let addr = world.address(VoxelPos::new(-1, -64, 0)).unwrap();
        assert_eq!(addr.chunk, ChunkCoord::new(-1, 0));
        assert_eq!(addr.slot, 0);
    }
}
