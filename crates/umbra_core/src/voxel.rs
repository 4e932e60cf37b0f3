//! # Voxel Addressing
//!
//! Coordinates and identifiers shared by every part of the shadow layer.
//!
//! ## Layout
//!
//! ```text
//! World:   VoxelPos (x, y, z)            global, signed
//! Chunk:   ChunkCoord (cx, cz)           16x16 column footprint
//! Section: slot = (y >> 4) - min_section 16x16x16 cube
//! Index:   (y << 8) | (z << 4) | x       local, 0..4096
//! ```

use serde::{Deserialize, Serialize};

/// Section edge length in voxels.
pub const SECTION_SIZE: usize = 16;

/// Voxels per section (16^3).
pub const VOXELS_PER_SECTION: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;

/// Bits per mask word.
pub const WORD_BITS: usize = 64;

/// Words needed to cover one section.
pub const MASK_WORDS: usize = VOXELS_PER_SECTION / WORD_BITS;

const SHIFT: i32 = 4;
const LOCAL_MASK: i32 = (SECTION_SIZE as i32) - 1;

/// Opaque identifier of a voxel's material/state.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VoxelType(pub u16);

impl VoxelType {
    /// Empty space.
    pub const AIR: Self = Self(0);
    /// Generic background rock.
    pub const STONE: Self = Self(1);

    /// Creates a voxel type from its raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Raw id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u16 {
        self.0
    }
}

/// Global voxel position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VoxelPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate (vertical).
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl VoxelPos {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing this position.
    #[inline]
    #[must_use]
    pub const fn chunk(self) -> ChunkCoord {
        ChunkCoord::new(self.x >> SHIFT, self.z >> SHIFT)
    }

    /// Absolute section index along Y (not yet offset by the world's minimum).
    #[inline]
    #[must_use]
    pub const fn section_y(self) -> i32 {
        self.y >> SHIFT
    }

    /// Index of this position inside its section.
    #[inline]
    #[must_use]
    pub const fn local_index(self) -> usize {
        local_index(
            (self.x & LOCAL_MASK) as usize,
            (self.y & LOCAL_MASK) as usize,
            (self.z & LOCAL_MASK) as usize,
        )
    }

    /// Returns this position shifted by the given offset, wrapping at the
    /// `i32` limits.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.wrapping_add(dx),
            self.y.wrapping_add(dy),
            self.z.wrapping_add(dz),
        )
    }

    /// Returns this position shifted by the given offset, or `None` if any
    /// axis leaves the `i32` range.
    #[inline]
    #[must_use]
    pub const fn checked_offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        match (
            self.x.checked_add(dx),
            self.y.checked_add(dy),
            self.z.checked_add(dz),
        ) {
            (Some(x), Some(y), Some(z)) => Some(Self::new(x, y, z)),
            _ => None,
        }
    }
}

/// Chunk coordinate in the world grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not voxels).
    pub x: i32,
    /// Z coordinate (in chunks, not voxels).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing a (possibly fractional) world position.
    ///
    /// Floors before shifting so that `-0.5` lands in chunk `-1`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_entity_pos(x: f64, z: f64) -> Self {
        Self::new((x.floor() as i32) >> SHIFT, (z.floor() as i32) >> SHIFT)
    }

    /// World X of the chunk's origin corner.
    #[inline]
    #[must_use]
    pub const fn origin_x(self) -> i32 {
        self.x << SHIFT
    }

    /// World Z of the chunk's origin corner.
    #[inline]
    #[must_use]
    pub const fn origin_z(self) -> i32 {
        self.z << SHIFT
    }
}

/// Local index from section-local coordinates.
#[inline]
#[must_use]
pub const fn local_index(x: usize, y: usize, z: usize) -> usize {
    (y << 8) | (z << 4) | x
}

/// Section-local coordinates from a local index, as `(x, y, z)`.
#[inline]
#[must_use]
pub const fn local_coords(index: usize) -> (usize, usize, usize) {
    (index & 0xF, (index >> 8) & 0xF, (index >> 4) & 0xF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_from_negative_positions() {
        assert_eq!(VoxelPos::new(0, 0, 0).chunk(), ChunkCoord::new(0, 0));
        assert_eq!(VoxelPos::new(15, 0, 15).chunk(), ChunkCoord::new(0, 0));
        assert_eq!(VoxelPos::new(16, 0, -1).chunk(), ChunkCoord::new(1, -1));
        assert_eq!(VoxelPos::new(-17, 0, -16).chunk(), ChunkCoord::new(-2, -1));
    }

    #[test]
    fn test_local_index_roundtrip() {
        let pos = VoxelPos::new(-3, -61, 37);
        let (x, y, z) = local_coords(pos.local_index());
        assert_eq!((x, y, z), (13, 3, 5));
        assert_eq!(pos.section_y(), -4);
    }

    #[test]
    fn test_offset_at_coordinate_limits() {
        let edge = VoxelPos::new(i32::MAX, 0, i32::MIN);
        assert_eq!(edge.offset(1, 0, -1), VoxelPos::new(i32::MIN, 0, i32::MAX));
        assert_eq!(edge.checked_offset(1, 0, 0), None);
        assert_eq!(edge.checked_offset(0, 0, -1), None);
        assert_eq!(edge.checked_offset(-1, 1, 1), Some(VoxelPos::new(i32::MAX - 1, 1, i32::MIN + 1)));
    }

    #[test]
    fn test_entity_pos_floors() {
        assert_eq!(ChunkCoord::from_entity_pos(-0.5, 15.9), ChunkCoord::new(-1, 0));
        assert_eq!(ChunkCoord::from_entity_pos(32.0, -16.0), ChunkCoord::new(2, -1));
    }
}
