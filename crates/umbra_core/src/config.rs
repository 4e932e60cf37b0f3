//! # Shadow Configuration
//!
//! Loaded once at startup from TOML:
//!
//! ```toml
//! [world]
//! min_section = -4
//! section_count = 24
//!
//! [policy]
//! adjacency = "faces"
//! traversable = [0, 8, 9, 20]
//!
//! [disguise]
//! default_background = 1
//!
//! [[disguise.strata]]
//! name = "deep"
//! min_y = -64
//! max_y = -1
//! background = 2
//!
//! [[disguise.rules]]
//! real = 56
//! disguise = 2
//! strata = ["deep"]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::disguise::{DisguiseConfig, DisguiseTable};
use crate::error::{ShadowError, ShadowResult};
use crate::voxel::{VoxelType, SECTION_SIZE, VOXELS_PER_SECTION};

/// Most sections a chunk column may hold.
pub const MAX_SECTION_COUNT: usize = 256;

/// Largest absolute section Y accepted for `min_section`.
pub const MAX_SECTION_Y: i32 = 4096;

/// Vertical extent of every chunk in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldShape {
    /// Absolute section Y of slot 0 (`-4` means the world starts at Y = -64).
    pub min_section: i32,
    /// Sections per chunk.
    pub section_count: usize,
}

impl WorldShape {
    /// Creates a world shape.
    #[must_use]
    pub const fn new(min_section: i32, section_count: usize) -> Self {
        Self {
            min_section,
            section_count,
        }
    }

    /// Lowest voxel Y.
    #[inline]
    #[must_use]
    pub const fn min_y(self) -> i32 {
        self.min_section * SECTION_SIZE as i32
    }

    /// One past the highest voxel Y.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn max_y_exclusive(self) -> i32 {
        (self.min_section + self.section_count as i32) * SECTION_SIZE as i32
    }

    /// Section slot for an absolute section Y, if inside the world.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn slot_of(self, section_y: i32) -> Option<usize> {
        let slot = section_y - self.min_section;
        (slot >= 0 && (slot as usize) < self.section_count).then_some(slot as usize)
    }

    /// Checks that the shape is non-empty and every voxel Y fits in an `i32`.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::InvalidConfig`] naming the offending field.
    pub fn validate(self) -> ShadowResult<()> {
        if self.section_count == 0 {
            return Err(ShadowError::InvalidConfig(
                "world.section_count must be at least 1".into(),
            ));
        }
        if self.section_count > MAX_SECTION_COUNT {
            return Err(ShadowError::InvalidConfig(format!(
                "world.section_count {} exceeds {MAX_SECTION_COUNT}",
                self.section_count
            )));
        }
        if !(-MAX_SECTION_Y..=MAX_SECTION_Y).contains(&self.min_section) {
            return Err(ShadowError::InvalidConfig(format!(
                "world.min_section {} outside -{MAX_SECTION_Y}..={MAX_SECTION_Y}",
                self.min_section
            )));
        }
        Ok(())
    }

    /// Voxels in one chunk column.
    #[inline]
    #[must_use]
    pub const fn voxels_per_chunk(self) -> usize {
        self.section_count * VOXELS_PER_SECTION
    }
}

impl Default for WorldShape {
    fn default() -> Self {
        Self::new(-4, 24)
    }
}

/// Which neighbours a newly traversable voxel reveals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjacency {
    /// The 6 face-sharing neighbours.
    #[default]
    Faces,
    /// Faces plus the 12 edge-sharing neighbours.
    Edges,
    /// All 26 surrounding voxels.
    Full,
}

impl Adjacency {
    /// Neighbour offsets for this policy.
    #[must_use]
    pub fn offsets(self) -> Vec<(i32, i32, i32)> {
        let mut out = Vec::with_capacity(26);
        for dy in -1..=1i32 {
            for dz in -1..=1i32 {
                for dx in -1..=1i32 {
                    let axes = dx.abs() + dy.abs() + dz.abs();
                    let keep = match self {
                        Self::Faces => axes == 1,
                        Self::Edges => axes == 1 || axes == 2,
                        Self::Full => axes > 0,
                    };
                    if keep {
                        out.push((dx, dy, dz));
                    }
                }
            }
        }
        out
    }
}

/// The `[policy]` section of the config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Reveal neighbourhood.
    #[serde(default)]
    pub adjacency: Adjacency,
    /// Voxel types light and sight pass through. Air is always traversable.
    #[serde(default)]
    pub traversable: Vec<VoxelType>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            adjacency: Adjacency::Faces,
            traversable: vec![VoxelType::AIR],
        }
    }
}

/// Complete configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// World shape.
    #[serde(default)]
    pub world: WorldShape,
    /// Reveal policy.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Disguise rules.
    #[serde(default)]
    pub disguise: DisguiseConfig,
}

impl ShadowConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::InvalidConfig`] on malformed TOML or a world
    /// shape that fails [`WorldShape::validate`].
    pub fn from_toml_str(text: &str) -> ShadowResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ShadowError::InvalidConfig(e.to_string()))?;
        config.world.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> ShadowResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShadowError::InvalidConfig(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(
            "Loaded shadow config from {} ({} rules, {} sections)",
            path.display(),
            config.disguise.rules.len(),
            config.world.section_count
        );
        Ok(config)
    }
}

/// Runtime reveal policy derived from a [`ShadowConfig`].
#[derive(Clone, Debug)]
pub struct ShadowPolicy {
    adjacency: Adjacency,
    offsets: Vec<(i32, i32, i32)>,
    traversable: HashSet<VoxelType>,
    disguises: DisguiseTable,
}

impl ShadowPolicy {
    /// Builds the policy.
    ///
    /// # Errors
    ///
    /// Propagates disguise table validation errors.
    pub fn from_config(config: &ShadowConfig) -> ShadowResult<Self> {
        let disguises = DisguiseTable::from_config(&config.disguise)?;
        Ok(Self::new(
            config.policy.adjacency,
            config.policy.traversable.iter().copied(),
            disguises,
        ))
    }

    /// Builds a policy directly.
    #[must_use]
    pub fn new(
        adjacency: Adjacency,
        traversable: impl IntoIterator<Item = VoxelType>,
        disguises: DisguiseTable,
    ) -> Self {
        let mut traversable: HashSet<VoxelType> = traversable.into_iter().collect();
        traversable.insert(VoxelType::AIR);
        Self {
            adjacency,
            offsets: adjacency.offsets(),
            traversable,
            disguises,
        }
    }

    /// Reveal neighbourhood.
    #[inline]
    #[must_use]
    pub fn adjacency(&self) -> Adjacency {
        self.adjacency
    }

    /// Neighbour offsets of the configured adjacency.
    #[inline]
    #[must_use]
    pub fn offsets(&self) -> &[(i32, i32, i32)] {
        &self.offsets
    }

    /// Returns true if sight passes through `voxel`.
    #[inline]
    #[must_use]
    pub fn is_traversable(&self, voxel: VoxelType) -> bool {
        self.traversable.contains(&voxel)
    }

    /// The disguise table.
    #[inline]
    #[must_use]
    pub fn disguises(&self) -> &DisguiseTable {
        &self.disguises
    }
}
