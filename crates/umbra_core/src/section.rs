//! # Section Store
//!
//! A 16x16x16 slice of a chunk: the real voxel types plus the published
//! shadow mask.
//!
//! ## Thread Safety
//!
//! - Real types are per-voxel atomics. A reader sees the old or new value of
//!   a voxel, never a mix.
//! - The mask is an `Arc<ShadowMask>` snapshot. Reveals compute the next mask
//!   under an upgradable read (readers keep going) and only take the write
//!   lock for the pointer swap.
//!
//! The mutation path stores the real type before revealing. An encoder racing
//! a change therefore sees either the disguise or a stale value, never the
//! real type of a voxel that is still hidden.

use std::sync::atomic::{AtomicU16, Ordering};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::disguise::DisguiseTable;
use crate::mask::MaskSnapshot;
use crate::voxel::{local_coords, VoxelType, VOXELS_PER_SECTION};

/// One vertical slice of a chunk.
pub struct Section {
    /// Vertical slot inside the chunk.
    slot: usize,
    /// World Y of local y = 0.
    base_y: i32,
    /// Real voxel types, indexed by local index.
    voxels: Box<[AtomicU16]>,
    /// Published mask. `None` = fully revealed.
    mask: RwLock<MaskSnapshot>,
}

impl Section {
    /// Creates a section from its real voxel types with nothing hidden.
    ///
    /// Missing trailing voxels are filled with air; extra ones are ignored.
    #[must_use]
    pub fn new(slot: usize, base_y: i32, voxels: &[VoxelType]) -> Self {
        let voxels = (0..VOXELS_PER_SECTION)
            .map(|i| AtomicU16::new(voxels.get(i).copied().unwrap_or(VoxelType::AIR).id()))
            .collect();
        Self {
            slot,
            base_y,
            voxels,
            mask: RwLock::new(None),
        }
    }

    /// Vertical slot inside the chunk.
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// World Y of the section's bottom layer.
    #[inline]
    #[must_use]
    pub fn base_y(&self) -> i32 {
        self.base_y
    }

    /// World Y of a local index.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn y_of(&self, index: usize) -> i32 {
        self.base_y + local_coords(index).1 as i32
    }

    /// Real voxel type at `index`. Out-of-range indices read as air.
    #[inline]
    #[must_use]
    pub fn real_type(&self, index: usize) -> VoxelType {
        self.voxels
            .get(index)
            .map_or(VoxelType::AIR, |v| VoxelType(v.load(Ordering::Acquire)))
    }

    /// Stores a real voxel type, returning the previous one.
    ///
    /// Does not touch the mask; reveals are driven by the update engine.
    pub fn set_real_type(&self, index: usize, voxel: VoxelType) -> VoxelType {
        self.voxels
            .get(index)
            .map_or(VoxelType::AIR, |v| VoxelType(v.swap(voxel.id(), Ordering::AcqRel)))
    }

    /// Returns true if `index` is currently hidden.
    #[inline]
    #[must_use]
    pub fn is_hidden(&self, index: usize) -> bool {
        self.mask.read().as_ref().is_some_and(|m| m.is_hidden(index))
    }

    /// The value an uninformed client should see at `index`.
    #[must_use]
    pub fn shadow_type(&self, index: usize, table: &DisguiseTable) -> VoxelType {
        let hidden = self.is_hidden(index);
        let real = self.real_type(index);
        if hidden {
            table.disguise_for(real, self.y_of(index))
        } else {
            real
        }
    }

    /// Shadow values of the whole section, for bulk chunk encoding.
    #[must_use]
    pub fn shadow_types(&self, table: &DisguiseTable) -> Vec<VoxelType> {
        let mask = self.current_mask_snapshot();
        (0..VOXELS_PER_SECTION)
            .map(|i| {
                let real = self.real_type(i);
                match &mask {
                    Some(m) if m.is_hidden(i) => table.disguise_for(real, self.y_of(i)),
                    _ => real,
                }
            })
            .collect()
    }

    /// The currently published mask.
    #[inline]
    #[must_use]
    pub fn current_mask_snapshot(&self) -> MaskSnapshot {
        self.mask.read().clone()
    }

    /// Replaces the published mask. Empty masks are stored as `None`.
    pub fn publish_mask(&self, mask: MaskSnapshot) {
        let mask = mask.filter(|m| !m.is_empty());
        *self.mask.write() = mask;
    }

    /// Clears the listed bits and publishes the result in one swap.
    ///
    /// Returns the indices that were hidden before the call. Nothing is
    /// published when no listed bit was set.
    pub fn reveal(&self, indices: &[usize]) -> Vec<usize> {
        let guard = self.mask.upgradable_read();
        let Some(current) = guard.as_ref() else {
            return Vec::new();
        };

        let mut newly: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| current.is_hidden(i))
            .collect();
        newly.sort_unstable();
        newly.dedup();
        if newly.is_empty() {
            return newly;
        }

        let next = current.with_bits_cleared(&newly).into_snapshot();
        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        *guard = next;
        newly
    }

    /// Number of hidden voxels.
    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.mask.read().as_ref().map_or(0, |m| m.hidden_count())
    }

    /// Copies the real voxel types out.
    #[must_use]
    pub fn real_types(&self) -> Vec<VoxelType> {
        self.voxels
            .iter()
            .map(|v| VoxelType(v.load(Ordering::Acquire)))
            .collect()
    }
}

impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section")
            .field("slot", &self.slot)
            .field("base_y", &self.base_y)
            .field("hidden", &self.hidden_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::disguise::{DisguiseConfig, RuleConfig};
    use crate::mask::ShadowMask;
    use crate::voxel::local_index;

    const DIAMOND: VoxelType = VoxelType(56);

    fn table() -> DisguiseTable {
        DisguiseTable::from_config(&DisguiseConfig {
            default_background: VoxelType::STONE,
            strata: vec![],
            rules: vec![RuleConfig { real: DIAMOND, disguise: VoxelType::STONE, strata: vec![] }],
        })
        .unwrap()
    }

    #[test]
    fn test_shadow_type_follows_mask() {
        let idx = local_index(3, 4, 5);
        let mut voxels = vec![VoxelType::STONE; VOXELS_PER_SECTION];
        voxels[idx] = DIAMOND;
        let section = Section::new(0, 0, &voxels);
        let table = table();

        // Fresh sections hide nothing
        assert_eq!(section.shadow_type(idx, &table), DIAMOND);

        section.publish_mask(ShadowMask::from_fn(|i| i == idx).into_snapshot());
        assert!(section.is_hidden(idx));
        assert_eq!(section.shadow_type(idx, &table), VoxelType::STONE);
        assert_eq!(section.real_type(idx), DIAMOND);

        assert_eq!(section.reveal(&[idx]), vec![idx]);
        assert_eq!(section.shadow_type(idx, &table), DIAMOND);
        assert!(section.current_mask_snapshot().is_none());
    }

    #[test]
    fn test_reveal_is_idempotent() {
        let section = Section::new(0, 0, &[]);
        section.publish_mask(ShadowMask::from_fn(|i| i < 10).into_snapshot());

        assert_eq!(section.reveal(&[2, 1, 2, 50]), vec![1, 2]);
        let before = section.current_mask_snapshot();
        assert!(section.reveal(&[1, 2]).is_empty());
        let after = section.current_mask_snapshot();
        // Nothing republished
        assert!(Arc::ptr_eq(before.as_ref().unwrap(), after.as_ref().unwrap()));
        assert_eq!(section.hidden_count(), 8);
    }

    #[test]
    fn test_publish_empty_mask_stores_none() {
        let section = Section::new(2, 32, &[]);
        section.publish_mask(Some(Arc::new(ShadowMask::revealed())));
        assert!(section.current_mask_snapshot().is_none());
        assert_eq!(section.y_of(local_index(0, 15, 0)), 47);
    }

    #[test]
    fn test_set_real_type_returns_previous() {
        let section = Section::new(0, 0, &[VoxelType::STONE]);
        assert_eq!(section.set_real_type(0, DIAMOND), VoxelType::STONE);
        assert_eq!(section.real_type(0), DIAMOND);
        assert_eq!(section.real_type(VOXELS_PER_SECTION), VoxelType::AIR);
    }
}
