//! # Hook Points
//!
//! The host server calls into UMBRA through these traits. UMBRA never
//! reaches into host internals.
//!
//! ```text
//! Host calls:                     UMBRA implements:
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │ chunk load / unload  │ ─────► │ ChunkLifecycleHook   │
//! │ voxel change         │ ─────► │ VoxelChangeHook      │  mutation thread
//! ├──────────────────────┤        ├──────────────────────┤
//! │ encode voxel/section │ ─────► │ OutboundEncodeHook   │  encoder workers
//! ├──────────────────────┤        ├──────────────────────┤
//! │ join / leave         │ ─────► │ ConnectionHook       │  connection events
//! └──────────────────────┘        └──────────────────────┘
//! ```

use crossbeam_channel::Sender;
use umbra_core::{
    ChunkCoord, LoadReport, MaskArchive, RevealReport, ShadowResult, VoxelChange, VoxelPos,
    VoxelType,
};
use umbra_debug::{ConnectionId, DebugMessage, PermissionLevel};

// ============================================================================
// MUTATION THREAD
// ============================================================================

/// Chunk residency events.
///
/// Called on the mutation thread only.
pub trait ChunkLifecycleHook: Send + Sync {
    /// A chunk column became resident. `voxels` holds every section bottom
    /// first in local index order.
    ///
    /// # Errors
    ///
    /// Malformed column data or a chunk that is already resident.
    fn on_chunk_load(
        &self,
        coord: ChunkCoord,
        voxels: &[VoxelType],
        archive: Option<&MaskArchive>,
    ) -> ShadowResult<LoadReport>;

    /// A chunk column is being dropped. The returned archive may be stored
    /// next to the chunk and passed back on the next load.
    ///
    /// # Errors
    ///
    /// The chunk was not resident.
    fn on_chunk_unload(&self, coord: ChunkCoord) -> ShadowResult<MaskArchive>;
}

/// Voxel mutations.
///
/// Must be called synchronously, on the mutation thread, every time a real
/// voxel type changes.
pub trait VoxelChangeHook: Send + Sync {
    /// Stores the new type and reveals what it exposes.
    fn on_voxel_change(&self, change: VoxelChange) -> RevealReport;
}

// ============================================================================
// ENCODER WORKERS
// ============================================================================

/// What an outbound encoder must call instead of reading real types.
pub trait OutboundEncodeHook: Send + Sync {
    /// Value to encode in a single-voxel update packet.
    fn voxel_for_client(&self, pos: VoxelPos) -> Option<VoxelType>;

    /// Values to encode for a whole section of a chunk data packet.
    fn section_for_client(&self, coord: ChunkCoord, slot: usize) -> Option<Vec<VoxelType>>;
}

// ============================================================================
// CONNECTION EVENTS
// ============================================================================

/// Connection lifecycle.
pub trait ConnectionHook: Send + Sync {
    /// A connection finished joining. `channels` are the side channels it
    /// advertised. Returns whether it became a diagnostic observer.
    fn on_join(
        &self,
        id: ConnectionId,
        channels: &[&str],
        permission: PermissionLevel,
        sink: Sender<DebugMessage>,
    ) -> bool;

    /// A connection closed.
    fn on_leave(&self, id: ConnectionId);
}
