//! # Mask Update Engine
//!
//! Maintains the hidden bits of every resident section.
//!
//! ## Rules
//!
//! ```text
//! LOAD     sensitive voxel with no traversable neighbour  -> hidden
//!          everything else                                -> revealed
//!          loaded neighbours facing new open voxels       -> revealed
//!
//! CHANGE   new type traversable   -> reveal P and its neighbours
//!          new type opaque        -> nothing
//! ```
//!
//! Bits are only ever set at load. A change touches at most the configured
//! neighbourhood (6 faces by default) plus P itself, never a whole chunk.
//!
//! Neighbours in unloaded chunks are skipped. When such a chunk loads it
//! re-derives its mask from whatever is resident at that moment, so no queue
//! of deferred reveals is kept.
//!
//! ## Threading
//!
//! All methods here run on the world's single mutation thread. Readers go
//! through [`crate::ShadowReader`] and never wait on mask computation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::archive::MaskArchive;
use crate::chunk::Chunk;
use crate::config::ShadowPolicy;
use crate::error::{ShadowError, ShadowResult};
use crate::mask::{MaskSnapshot, ShadowMask};
use crate::section::Section;
use crate::voxel::{local_coords, ChunkCoord, VoxelPos, VoxelType, SECTION_SIZE, VOXELS_PER_SECTION};
use crate::world::{ShadowWorld, VoxelAddress};

/// A voxel's real type changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxelChange {
    /// Where.
    pub pos: VoxelPos,
    /// Previous real type.
    pub old: VoxelType,
    /// New real type.
    pub new: VoxelType,
}

/// Positions revealed by a single change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevealReport {
    /// Newly revealed positions, in no particular order.
    pub revealed: Vec<VoxelPos>,
}

impl RevealReport {
    /// Returns true if nothing was revealed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revealed.is_empty()
    }
}

/// Summary of a chunk load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Hidden voxels in the new chunk.
    pub hidden: usize,
    /// Voxels revealed in already-loaded neighbours.
    pub neighbor_reveals: usize,
    /// Whether an archive was applied.
    pub archive_applied: bool,
}

/// Applies load/unload/change events to the resident masks.
#[derive(Clone)]
pub struct MaskUpdateEngine {
    world: Arc<ShadowWorld>,
    policy: Arc<ShadowPolicy>,
}

/// Pending reveals for one section.
struct SectionBatch {
    chunk: ChunkCoord,
    slot: usize,
    targets: Vec<(usize, VoxelPos)>,
}

impl MaskUpdateEngine {
    /// Creates an engine over a world.
    #[must_use]
    pub fn new(world: Arc<ShadowWorld>, policy: Arc<ShadowPolicy>) -> Self {
        Self { world, policy }
    }

    /// The world this engine maintains.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &Arc<ShadowWorld> {
        &self.world
    }

    /// The reveal policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &Arc<ShadowPolicy> {
        &self.policy
    }

    // =========================================================================
    // LOAD / UNLOAD
    // =========================================================================

    /// Makes a chunk resident and seeds its masks.
    ///
    /// `archive`, when given, can only reveal more: the stored mask is
    /// intersected with the freshly computed one. A corrupt archive, or one
    /// captured from a different chunk, is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::VoxelDataLength`] for a malformed column and
    /// [`ShadowError::ChunkAlreadyLoaded`] if the chunk is resident.
    pub fn load_chunk(
        &self,
        coord: ChunkCoord,
        voxels: &[VoxelType],
        archive: Option<&MaskArchive>,
    ) -> ShadowResult<LoadReport> {
        if self.world.is_loaded(coord) {
            return Err(ShadowError::ChunkAlreadyLoaded(coord));
        }
        let chunk = Arc::new(Chunk::from_voxels(coord, self.world.shape(), voxels)?);
        let neighbors = self.resident_neighbors(coord);

        let mut masks: Vec<MaskSnapshot> = chunk
            .sections()
            .iter()
            .map(|section| self.seed_mask(&chunk, section, &neighbors))
            .collect();

        let archive = archive.filter(|archive| {
            let own = archive.coord() == coord;
            if !own {
                tracing::warn!(
                    "Ignoring mask archive of chunk [{},{}] offered for chunk [{},{}]",
                    archive.coord().x,
                    archive.coord().z,
                    coord.x,
                    coord.z
                );
            }
            own
        });
        let archive_applied = match archive.map(MaskArchive::masks) {
            Some(Ok(stored)) if stored.len() == masks.len() => {
                for (mask, stored) in masks.iter_mut().zip(stored) {
                    *mask = match (mask.take(), stored) {
                        (Some(fresh), Some(stored)) => fresh.intersect(&stored).into_snapshot(),
                        _ => None,
                    };
                }
                true
            }
            Some(Ok(stored)) => {
                tracing::warn!(
                    "Ignoring mask archive for chunk [{},{}]: {} sections, expected {}",
                    coord.x,
                    coord.z,
                    stored.len(),
                    masks.len()
                );
                false
            }
            Some(Err(e)) => {
                tracing::warn!("Ignoring mask archive for chunk [{},{}]: {}", coord.x, coord.z, e);
                false
            }
            None => false,
        };

        for (section, mask) in chunk.sections().iter().zip(masks) {
            section.publish_mask(mask);
        }
        let hidden = chunk.hidden_count();

        self.world.insert(Arc::clone(&chunk))?;
        let neighbor_reveals = self.reveal_facing_neighbors(&chunk, &neighbors);

        tracing::debug!(
            "Chunk [{},{}] loaded: {} hidden, {} revealed in neighbours",
            coord.x,
            coord.z,
            hidden,
            neighbor_reveals
        );

        Ok(LoadReport {
            hidden,
            neighbor_reveals,
            archive_applied,
        })
    }

    /// Drops a chunk and its masks, returning the masks as an archive.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::ChunkNotLoaded`] if the chunk is not resident.
    pub fn unload_chunk(&self, coord: ChunkCoord) -> ShadowResult<MaskArchive> {
        let chunk = self
            .world
            .remove(coord)
            .ok_or(ShadowError::ChunkNotLoaded(coord))?;
        tracing::debug!(
            "Chunk [{},{}] unloaded with {} hidden voxels",
            coord.x,
            coord.z,
            chunk.hidden_count()
        );
        Ok(MaskArchive::capture(&chunk))
    }

    /// Resident chunks in the 3x3 ring around `coord`.
    fn resident_neighbors(&self, coord: ChunkCoord) -> HashMap<ChunkCoord, Arc<Chunk>> {
        let mut out = HashMap::with_capacity(8);
        for dz in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dz == 0 {
                    continue;
                }
                let (Some(x), Some(z)) = (coord.x.checked_add(dx), coord.z.checked_add(dz)) else {
                    continue;
                };
                let n = ChunkCoord::new(x, z);
                if let Some(chunk) = self.world.chunk_at(n) {
                    out.insert(n, chunk);
                }
            }
        }
        out
    }

    /// Whether sight passes through `pos` as seen from a chunk being loaded.
    ///
    /// Above the world is open sky, below it is solid, unloaded chunks count
    /// as solid until they load.
    fn is_open(&self, pos: VoxelPos, chunk: &Chunk, neighbors: &HashMap<ChunkCoord, Arc<Chunk>>) -> bool {
        let shape = self.world.shape();
        if pos.y >= shape.max_y_exclusive() {
            return true;
        }
        let Some(addr) = self.world.address(pos) else {
            return false;
        };
        let real = if addr.chunk == chunk.coord() {
            chunk.real_type(addr.slot, addr.index)
        } else if let Some(n) = neighbors.get(&addr.chunk) {
            n.real_type(addr.slot, addr.index)
        } else {
            return false;
        };
        self.policy.is_traversable(real)
    }

    /// Initial mask of one section.
    fn seed_mask(
        &self,
        chunk: &Chunk,
        section: &Section,
        neighbors: &HashMap<ChunkCoord, Arc<Chunk>>,
    ) -> MaskSnapshot {
        let table = self.policy.disguises();
        let origin = section_origin(chunk.coord(), section);

        ShadowMask::from_fn(|index| {
            if !table.is_sensitive(section.real_type(index)) {
                return false;
            }
            let pos = local_pos(origin, index);
            !self
                .policy
                .offsets()
                .iter()
                .any(|&(dx, dy, dz)| {
                    pos.checked_offset(dx, dy, dz)
                        .is_some_and(|n| self.is_open(n, chunk, neighbors))
                })
        })
        .into_snapshot()
    }

    /// Reveals voxels of resident neighbours that face open voxels of a
    /// freshly loaded chunk.
    fn reveal_facing_neighbors(
        &self,
        chunk: &Chunk,
        neighbors: &HashMap<ChunkCoord, Arc<Chunk>>,
    ) -> usize {
        if neighbors.is_empty() {
            return 0;
        }
        let last = SECTION_SIZE - 1;
        let mut batches: Vec<SectionBatch> = Vec::new();

        for section in chunk.sections() {
            let origin = section_origin(chunk.coord(), section);
            for index in 0..VOXELS_PER_SECTION {
                let (x, _, z) = local_coords(index);
                if x != 0 && x != last && z != 0 && z != last {
                    continue;
                }
                if !self.policy.is_traversable(section.real_type(index)) {
                    continue;
                }
                let pos = local_pos(origin, index);
                for &(dx, dy, dz) in self.policy.offsets() {
                    let Some(target) = pos.checked_offset(dx, dy, dz) else {
                        continue;
                    };
                    if let Some(addr) = self.world.address(target) {
                        if addr.chunk != chunk.coord() && neighbors.contains_key(&addr.chunk) {
                            push_target(&mut batches, addr, target);
                        }
                    }
                }
            }
        }

        self.flush(batches, None).len()
    }

    // =========================================================================
    // CHANGES
    // =========================================================================

    /// Stores a new real type at `pos` and reveals what it exposes.
    ///
    /// Returns an empty report if the chunk is not resident.
    pub fn set_voxel(&self, pos: VoxelPos, voxel: VoxelType) -> RevealReport {
        let Some((chunk, addr)) = self.resolve(pos) else {
            tracing::debug!("Dropping change at ({}, {}, {}): chunk not resident", pos.x, pos.y, pos.z);
            return RevealReport::default();
        };
        let Some(section) = chunk.section_at(addr.slot) else {
            return RevealReport::default();
        };
        section.set_real_type(addr.index, voxel);
        self.propagate(&chunk, pos, voxel)
    }

    /// Applies a change event delivered by the host.
    ///
    /// The event's `new` type becomes the stored real type; `old` is only
    /// used for logging.
    pub fn apply(&self, change: VoxelChange) -> RevealReport {
        let report = self.set_voxel(change.pos, change.new);
        if !report.is_empty() {
            tracing::trace!(
                "({}, {}, {}) {} -> {} revealed {}",
                change.pos.x,
                change.pos.y,
                change.pos.z,
                change.old.id(),
                change.new.id(),
                report.revealed.len()
            );
        }
        report
    }

    fn resolve(&self, pos: VoxelPos) -> Option<(Arc<Chunk>, VoxelAddress)> {
        let addr = self.world.address(pos)?;
        let chunk = self.world.chunk_at(addr.chunk)?;
        Some((chunk, addr))
    }

    /// Single-hop reveal around a changed voxel.
    fn propagate(&self, own: &Arc<Chunk>, pos: VoxelPos, voxel: VoxelType) -> RevealReport {
        if !self.policy.is_traversable(voxel) {
            return RevealReport::default();
        }

        let mut batches: Vec<SectionBatch> = Vec::with_capacity(4);
        if let Some(addr) = self.world.address(pos) {
            push_target(&mut batches, addr, pos);
        }
        for &(dx, dy, dz) in self.policy.offsets() {
            let Some(target) = pos.checked_offset(dx, dy, dz) else {
                continue;
            };
            if let Some(addr) = self.world.address(target) {
                push_target(&mut batches, addr, target);
            }
        }

        RevealReport {
            revealed: self.flush(batches, Some(own)),
        }
    }

    /// Publishes one new snapshot per touched section.
    fn flush(&self, batches: Vec<SectionBatch>, own: Option<&Arc<Chunk>>) -> Vec<VoxelPos> {
        let mut revealed = Vec::new();
        for batch in batches {
            let chunk = match own {
                Some(own) if own.coord() == batch.chunk => Arc::clone(own),
                _ => match self.world.chunk_at(batch.chunk) {
                    Some(chunk) => chunk,
                    // Healed by the boundary scan when it loads
                    None => continue,
                },
            };
            let Some(section) = chunk.section_at(batch.slot) else {
                continue;
            };

            let indices: Vec<usize> = batch.targets.iter().map(|&(i, _)| i).collect();
            let newly = section.reveal(&indices);
            revealed.extend(
                batch
                    .targets
                    .iter()
                    .filter(|(i, _)| newly.binary_search(i).is_ok())
                    .map(|&(_, p)| p),
            );
        }
        revealed.sort_unstable_by_key(|p| (p.x, p.y, p.z));
        revealed.dedup();
        revealed
    }
}

impl std::fmt::Debug for MaskUpdateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskUpdateEngine")
            .field("world", &self.world)
            .field("adjacency", &self.policy.adjacency())
            .finish()
    }
}

fn section_origin(coord: ChunkCoord, section: &Section) -> VoxelPos {
    VoxelPos::new(coord.origin_x(), section.base_y(), coord.origin_z())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn local_pos(origin: VoxelPos, index: usize) -> VoxelPos {
    let (x, y, z) = local_coords(index);
    origin.offset(x as i32, y as i32, z as i32)
}

fn push_target(batches: &mut Vec<SectionBatch>, addr: VoxelAddress, pos: VoxelPos) {
    match batches
        .iter_mut()
        .find(|b| b.chunk == addr.chunk && b.slot == addr.slot)
    {
        Some(batch) => batch.targets.push((addr.index, pos)),
        None => batches.push(SectionBatch {
            chunk: addr.chunk,
            slot: addr.slot,
            targets: vec![(addr.index, pos)],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Adjacency, WorldShape};
    use crate::disguise::{DisguiseConfig, DisguiseTable, RuleConfig};

    const ORE: VoxelType = VoxelType(56);

    fn engine(shape: WorldShape, adjacency: Adjacency) -> MaskUpdateEngine {
        let table = DisguiseTable::from_config(&DisguiseConfig {
            default_background: VoxelType::STONE,
            strata: vec![],
            rules: vec![RuleConfig { real: ORE, disguise: VoxelType::STONE, strata: vec![] }],
        })
        .unwrap();
        let policy = ShadowPolicy::new(adjacency, [], table);
        MaskUpdateEngine::new(Arc::new(ShadowWorld::new(shape)), Arc::new(policy))
    }

    fn solid_column(shape: WorldShape) -> Vec<VoxelType> {
        vec![VoxelType::STONE; shape.voxels_per_chunk()]
    }

    fn hidden(engine: &MaskUpdateEngine, pos: VoxelPos) -> bool {
        let addr = engine.world().address(pos).unwrap();
        engine
            .world()
            .chunk_at(addr.chunk)
            .unwrap()
            .section_at(addr.slot)
            .unwrap()
            .is_hidden(addr.index)
    }

    #[test]
    fn test_interior_air_reveals_at_load() {
        let shape = WorldShape::new(0, 2);
        let engine = engine(shape, Adjacency::Faces);
        let mut voxels = solid_column(shape);
        let ore = VoxelPos::new(5, 5, 5);
        let buried = VoxelPos::new(9, 9, 9);
        voxels[ore.local_index()] = ORE;
        voxels[VoxelPos::new(5, 6, 5).local_index()] = VoxelType::AIR;
        voxels[buried.local_index()] = ORE;

        let report = engine.load_chunk(ChunkCoord::new(0, 0), &voxels, None).unwrap();
        assert_eq!(report.hidden, 1);
        assert!(!hidden(&engine, ore));
        assert!(hidden(&engine, buried));
    }

    #[test]
    fn test_top_of_world_is_open() {
        let shape = WorldShape::new(0, 1);
        let engine = engine(shape, Adjacency::Faces);
        let mut voxels = solid_column(shape);
        let top = VoxelPos::new(3, 15, 3);
        let bottom = VoxelPos::new(3, 0, 3);
        voxels[top.local_index()] = ORE;
        voxels[bottom.local_index()] = ORE;

        engine.load_chunk(ChunkCoord::new(0, 0), &voxels, None).unwrap();
        assert!(!hidden(&engine, top));
        assert!(hidden(&engine, bottom));
    }

    #[test]
    fn test_change_reveals_across_sections() {
        let shape = WorldShape::new(0, 2);
        let engine = engine(shape, Adjacency::Faces);
        let mut voxels = solid_column(shape);
        let ore = VoxelPos::new(4, 16, 4);
        voxels[VOXELS_PER_SECTION + ore.local_index()] = ORE;
        engine.load_chunk(ChunkCoord::new(0, 0), &voxels, None).unwrap();
        assert!(hidden(&engine, ore));

        // Dig out the voxel directly below, in the lower section
        let report = engine.set_voxel(VoxelPos::new(4, 15, 4), VoxelType::AIR);
        assert_eq!(report.revealed, vec![ore]);
        assert!(!hidden(&engine, ore));
    }

    #[test]
    fn test_opaque_change_reveals_nothing() {
        let shape = WorldShape::new(0, 1);
        let engine = engine(shape, Adjacency::Faces);
        let mut voxels = solid_column(shape);
        voxels[VoxelPos::new(7, 7, 7).local_index()] = ORE;
        engine.load_chunk(ChunkCoord::new(0, 0), &voxels, None).unwrap();

        let report = engine.set_voxel(VoxelPos::new(7, 8, 7), VoxelType(3));
        assert!(report.is_empty());
        assert!(hidden(&engine, VoxelPos::new(7, 7, 7)));
    }

    #[test]
    fn test_change_in_unloaded_chunk_dropped() {
        let engine = engine(WorldShape::new(0, 1), Adjacency::Faces);
        assert!(engine.set_voxel(VoxelPos::new(100, 3, 100), VoxelType::AIR).is_empty());
    }

    #[test]
    fn test_diagonal_only_with_wider_adjacency() {
        let shape = WorldShape::new(0, 1);
        let diagonal = VoxelPos::new(6, 6, 6);
        for (adjacency, expect_hidden) in [(Adjacency::Faces, true), (Adjacency::Edges, false)] {
            let engine = engine(shape, adjacency);
            let mut voxels = solid_column(shape);
            voxels[diagonal.local_index()] = ORE;
            engine.load_chunk(ChunkCoord::new(0, 0), &voxels, None).unwrap();

            engine.set_voxel(VoxelPos::new(7, 7, 6), VoxelType::AIR);
            assert_eq!(hidden(&engine, diagonal), expect_hidden, "{adjacency:?}");
        }
    }

    #[test]
    fn test_unload_archive_restores_reveals() {
        let shape = WorldShape::new(0, 1);
        let engine = engine(shape, Adjacency::Faces);
        let coord = ChunkCoord::new(0, 0);
        let ore = VoxelPos::new(2, 2, 2);
        let mut voxels = solid_column(shape);
        voxels[ore.local_index()] = ORE;

        engine.load_chunk(coord, &voxels, None).unwrap();
        engine.set_voxel(VoxelPos::new(2, 3, 2), VoxelType::AIR);
        // Refill: the host persists the stone, the archive remembers the reveal
        engine.set_voxel(VoxelPos::new(2, 3, 2), VoxelType::STONE);
        let archive = engine.unload_chunk(coord).unwrap();
        assert!(engine.unload_chunk(coord).is_err());

        let report = engine.load_chunk(coord, &voxels, Some(&archive)).unwrap();
        assert!(report.archive_applied);
        assert!(!hidden(&engine, ore));

        // Without the archive the ore is hidden again
        engine.unload_chunk(coord).unwrap();
        engine.load_chunk(coord, &voxels, None).unwrap();
        assert!(hidden(&engine, ore));
    }

    #[test]
    fn test_archive_from_other_chunk_ignored() {
        let shape = WorldShape::new(0, 1);
        let engine = engine(shape, Adjacency::Faces);
        let explored = ChunkCoord::new(0, 0);
        let mut voxels = solid_column(shape);
        voxels[VoxelPos::new(2, 2, 2).local_index()] = ORE;
        engine.load_chunk(explored, &voxels, None).unwrap();
        engine.set_voxel(VoxelPos::new(2, 3, 2), VoxelType::AIR);
        engine.set_voxel(VoxelPos::new(2, 3, 2), VoxelType::STONE);
        let archive = engine.unload_chunk(explored).unwrap();

        let target = ChunkCoord::new(5, 5);
        let ore = VoxelPos::new(target.origin_x() + 2, 2, target.origin_z() + 2);
        let report = engine.load_chunk(target, &voxels, Some(&archive)).unwrap();
        assert!(!report.archive_applied);
        assert_eq!(report.hidden, 1);
        assert!(hidden(&engine, ore));
    }

    #[test]
    fn test_change_at_coordinate_limits() {
        let shape = WorldShape::new(0, 1);
        let engine = engine(shape, Adjacency::Full);
        let corner = VoxelPos::new(i32::MAX, 5, i32::MIN);
        let ore = corner.offset(-1, 0, 1);
        let mut voxels = solid_column(shape);
        voxels[ore.local_index()] = ORE;
        engine.load_chunk(corner.chunk(), &voxels, None).unwrap();
        assert!(hidden(&engine, ore));

        let report = engine.set_voxel(corner, VoxelType::AIR);
        assert_eq!(report.revealed, vec![ore]);
        assert_eq!(engine.world().loaded_count(), 1);
    }

    #[test]
    fn test_reload_rejected_while_resident() {
        let shape = WorldShape::new(0, 1);
        let engine = engine(shape, Adjacency::Faces);
        let voxels = solid_column(shape);
        engine.load_chunk(ChunkCoord::new(1, 1), &voxels, None).unwrap();
        assert_eq!(
            engine.load_chunk(ChunkCoord::new(1, 1), &voxels, None),
            Err(ShadowError::ChunkAlreadyLoaded(ChunkCoord::new(1, 1)))
        );
    }
}
