//! # Shadow Service
//!
//! Owns the world, the engine, the read facade and the diagnostic side and
//! implements every hook point. Clone it into each thread that needs it.

use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::Sender;
use umbra_core::{
    ChunkCoord, LoadReport, MaskArchive, MaskUpdateEngine, RevealReport, ShadowConfig,
    ShadowPolicy, ShadowReader, ShadowResult, ShadowWorld, VoxelChange, VoxelPos, VoxelType,
};
use umbra_debug::{
    ConnectionId, DebugMessage, DumpStatus, MaskDumper, ObserverRegistry, PermissionLevel,
};

use crate::hooks::{ChunkLifecycleHook, ConnectionHook, OutboundEncodeHook, VoxelChangeHook};

/// Entry point for a host server.
#[derive(Clone, Debug)]
pub struct ShadowService {
    engine: MaskUpdateEngine,
    reader: ShadowReader,
    observers: Arc<ObserverRegistry>,
    dumper: MaskDumper,
}

impl ShadowService {
    /// Builds a service from a parsed config.
    ///
    /// # Errors
    ///
    /// Invalid disguise rules or strata.
    pub fn from_config(config: &ShadowConfig) -> ShadowResult<Self> {
        let policy = ShadowPolicy::from_config(config)?;
        let world = ShadowWorld::new(config.world);
        Ok(Self::new(world, policy))
    }

    /// Builds a service from a TOML file.
    ///
    /// # Errors
    ///
    /// Unreadable file or invalid config.
    pub fn from_file(path: impl AsRef<Path>) -> ShadowResult<Self> {
        Self::from_config(&ShadowConfig::from_file(path)?)
    }

    /// Builds a service over an empty world.
    #[must_use]
    pub fn new(world: ShadowWorld, policy: ShadowPolicy) -> Self {
        let world = Arc::new(world);
        let policy = Arc::new(policy);
        let engine = MaskUpdateEngine::new(Arc::clone(&world), Arc::clone(&policy));
        let reader = ShadowReader::new(world, policy);
        let observers = Arc::new(ObserverRegistry::new());
        let dumper = MaskDumper::new(reader.clone(), Arc::clone(&observers));

        tracing::info!(
            "Shadow service ready: {} sensitive types, {:?} adjacency, {} sections per chunk",
            engine.policy().disguises().sensitive_count(),
            engine.policy().adjacency(),
            reader.section_count()
        );

        Self {
            engine,
            reader,
            observers,
            dumper,
        }
    }

    /// The mask update engine.
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &MaskUpdateEngine {
        &self.engine
    }

    /// The read facade.
    #[inline]
    #[must_use]
    pub fn reader(&self) -> &ShadowReader {
        &self.reader
    }

    /// Diagnostic observers.
    #[inline]
    #[must_use]
    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.observers
    }

    /// Handles the mask dump command for `requester` standing at (`x`, `z`).
    pub fn dump(&self, requester: ConnectionId, x: f64, z: f64) -> DumpStatus {
        self.dumper.dump(requester, x, z)
    }
}

impl ChunkLifecycleHook for ShadowService {
    fn on_chunk_load(
        &self,
        coord: ChunkCoord,
        voxels: &[VoxelType],
        archive: Option<&MaskArchive>,
    ) -> ShadowResult<LoadReport> {
        self.engine.load_chunk(coord, voxels, archive)
    }

    fn on_chunk_unload(&self, coord: ChunkCoord) -> ShadowResult<MaskArchive> {
        self.engine.unload_chunk(coord)
    }
}

impl VoxelChangeHook for ShadowService {
    fn on_voxel_change(&self, change: VoxelChange) -> RevealReport {
        let report = self.engine.apply(change);
        if !report.is_empty() && !self.observers.is_empty() {
            self.observers.publish_reveals(&report.revealed);
        }
        report
    }
}

impl OutboundEncodeHook for ShadowService {
    fn voxel_for_client(&self, pos: VoxelPos) -> Option<VoxelType> {
        self.reader.shadow_value(pos)
    }

    fn section_for_client(&self, coord: ChunkCoord, slot: usize) -> Option<Vec<VoxelType>> {
        self.reader.shadow_section(coord, slot)
    }
}

impl ConnectionHook for ShadowService {
    fn on_join(
        &self,
        id: ConnectionId,
        channels: &[&str],
        permission: PermissionLevel,
        sink: Sender<DebugMessage>,
    ) -> bool {
        self.observers
            .join(id, channels.iter().copied(), permission, sink)
    }

    fn on_leave(&self, id: ConnectionId) {
        self.observers.leave(id);
    }
}
