//! # UMBRA Core - The Shadow State Engine
//!
//! Keeps clients from learning what unexplored terrain contains.
//!
//! Every resident section carries a mask with one bit per voxel. A hidden
//! voxel is shown to clients as its disguise; a revealed voxel is shown as
//! it really is. Voxels are revealed when something next to them becomes
//! traversable and are never hidden again for the rest of the chunk session.
//!
//! ## Architecture
//!
//! ```text
//!   mutation thread                         encoder workers
//!        │                                        │
//!        ▼                                        ▼
//! ┌──────────────────┐   snapshot swap   ┌──────────────┐
//! │ MaskUpdateEngine │ ────────────────► │ ShadowReader │
//! └────────┬─────────┘                   └──────┬───────┘
//!          │            ┌─────────────┐         │
//!          └──────────► │ ShadowWorld │ ◄───────┘
//!                       │  Chunk      │
//!                       │   Section   │  real types + Arc<ShadowMask>
//!                       └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use umbra_core::{MaskUpdateEngine, ShadowConfig, ShadowPolicy, ShadowReader, ShadowWorld};
//!
//! let config = ShadowConfig::from_file("data/shadow.toml")?;
//! let policy = Arc::new(ShadowPolicy::from_config(&config)?);
//! let world = Arc::new(ShadowWorld::new(config.world));
//!
//! let engine = MaskUpdateEngine::new(Arc::clone(&world), Arc::clone(&policy));
//! let reader = ShadowReader::new(world, policy);
//!
//! engine.load_chunk(coord, &voxels, None)?;
//! let shown = reader.shadow_value(pos);
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod archive;
pub mod chunk;
pub mod config;
pub mod disguise;
pub mod engine;
pub mod error;
pub mod facade;
pub mod mask;
pub mod section;
pub mod voxel;
pub mod world;

pub use archive::MaskArchive;
pub use chunk::Chunk;
pub use config::{
    Adjacency, PolicyConfig, ShadowConfig, ShadowPolicy, WorldShape, MAX_SECTION_COUNT,
    MAX_SECTION_Y,
};
pub use disguise::{DisguiseConfig, DisguiseTable, RuleConfig, StratumConfig};
pub use engine::{LoadReport, MaskUpdateEngine, RevealReport, VoxelChange};
pub use error::{ShadowError, ShadowResult};
pub use facade::ShadowReader;
pub use mask::{MaskSnapshot, ShadowMask};
pub use section::Section;
pub use voxel::{
    local_coords, local_index, ChunkCoord, VoxelPos, VoxelType, MASK_WORDS, SECTION_SIZE,
    VOXELS_PER_SECTION, WORD_BITS,
};
pub use world::{ShadowWorld, VoxelAddress};
