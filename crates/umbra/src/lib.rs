//! # UMBRA - Shadow State Engine
//!
//! Hides unexplored terrain from clients of a shared voxel world.
//!
//! A host server builds one [`ShadowService`] at startup and calls it through
//! the traits in [`hooks`]:
//!
//! ```rust,ignore
//! use umbra::{ShadowService, ChunkLifecycleHook, VoxelChangeHook, OutboundEncodeHook};
//!
//! let shadow = ShadowService::from_file("data/shadow.toml")?;
//!
//! // mutation thread
//! shadow.on_chunk_load(coord, &voxels, stored_archive.as_ref())?;
//! shadow.on_voxel_change(change);
//!
//! // encoder worker
//! let value = shadow.voxel_for_client(pos);
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod hooks;
pub mod service;

pub use hooks::{ChunkLifecycleHook, ConnectionHook, OutboundEncodeHook, VoxelChangeHook};
pub use service::ShadowService;

pub use umbra_core;
pub use umbra_debug;
