//! # Mask Dump Command
//!
//! One-shot dump of the chunk a requester is standing in.
//!
//! Requests from connections that did not opt in, or that lack
//! [`PermissionLevel::ADMIN`], are ignored without a reply.

use std::sync::Arc;

use umbra_core::{ChunkCoord, ShadowReader};

use crate::channel::ChannelId;
use crate::codec::MaskDump;
use crate::registry::{ConnectionId, DebugMessage, ObserverRegistry, PermissionLevel};

/// Outcome of a dump request, mapped onto the host's command exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpStatus {
    /// Dump delivered.
    Sent {
        /// Chunk that was dumped.
        chunk: ChunkCoord,
        /// Sections in the dump.
        sections: usize,
    },
    /// Requester is not an authorized observer.
    Ignored,
    /// The requester's chunk is not resident.
    ChunkNotLoaded(ChunkCoord),
    /// The observer's sink could not take the message.
    Undelivered,
}

impl DumpStatus {
    /// Returns true if a dump was delivered.
    #[inline]
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Serves mask dumps to opted-in administrators.
#[derive(Clone, Debug)]
pub struct MaskDumper {
    reader: ShadowReader,
    registry: Arc<ObserverRegistry>,
}

impl MaskDumper {
    /// Creates a dumper.
    #[must_use]
    pub fn new(reader: ShadowReader, registry: Arc<ObserverRegistry>) -> Self {
        Self { reader, registry }
    }

    /// Whether `requester` may trigger a dump.
    #[must_use]
    pub fn is_authorized(&self, requester: ConnectionId) -> bool {
        self.registry
            .permission(requester)
            .is_some_and(PermissionLevel::is_admin)
    }

    /// Dumps the chunk containing world position (`x`, `z`) to `requester`.
    pub fn dump(&self, requester: ConnectionId, x: f64, z: f64) -> DumpStatus {
        if !self.is_authorized(requester) {
            tracing::trace!("Ignoring mask dump request from {}", requester.0);
            return DumpStatus::Ignored;
        }

        let chunk = ChunkCoord::from_entity_pos(x, z);
        let Some(dump) = MaskDump::capture(&self.reader, chunk) else {
            tracing::debug!("Mask dump for [{},{}] skipped: chunk not resident", chunk.x, chunk.z);
            return DumpStatus::ChunkNotLoaded(chunk);
        };

        let sections = dump.sections.len();
        let message = DebugMessage {
            channel: ChannelId::MASK,
            payload: dump.encode(),
        };
        if !self.registry.send(requester, message) {
            return DumpStatus::Undelivered;
        }

        tracing::debug!(
            "Sent mask dump for [{},{}] to {}: {} sections, {} hidden",
            chunk.x,
            chunk.z,
            requester.0,
            sections,
            dump.hidden_count()
        );
        DumpStatus::Sent { chunk, sections }
    }
}
