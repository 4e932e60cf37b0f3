//! # Shadow Error Types
//!
//! Errors surfaced by the shadow layer. None of these are fatal to the host:
//! callers fall back to treating voxels as never hidden or discard the input.

use thiserror::Error;

use crate::voxel::ChunkCoord;

/// Errors that can occur in the shadow layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShadowError {
    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A mask was built from the wrong number of words.
    #[error("mask length mismatch: expected {expected} words, found {found}")]
    MaskLength {
        /// Words a section mask needs.
        expected: usize,
        /// Words supplied.
        found: usize,
    },

    /// The chunk is not resident.
    #[error("chunk ({}, {}) is not loaded", .0.x, .0.z)]
    ChunkNotLoaded(ChunkCoord),

    /// The chunk is already resident.
    #[error("chunk ({}, {}) is already loaded", .0.x, .0.z)]
    ChunkAlreadyLoaded(ChunkCoord),

    /// Voxel data handed to a load does not match the world shape.
    #[error("voxel data length mismatch: expected {expected}, found {found}")]
    VoxelDataLength {
        /// Voxels a chunk column needs.
        expected: usize,
        /// Voxels supplied.
        found: usize,
    },

    /// A persisted mask archive could not be decoded.
    #[error("corrupt mask archive: {0}")]
    ArchiveCorrupt(String),
}

/// Result type for shadow operations.
pub type ShadowResult<T> = Result<T, ShadowError>;
