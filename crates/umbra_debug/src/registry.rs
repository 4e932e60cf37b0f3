//! # Observer Registry
//!
//! Connections that opted into diagnostics by advertising
//! [`ChannelId::UPDATE`] when they joined.
//!
//! ```text
//! join ──advertises update?──► ObserverRegistry ◄── leave
//!                                     │
//!                 publish_reveals ────┤──► Sender<DebugMessage> per observer
//!                 dump (read)     ────┘
//! ```
//!
//! Written only on join/leave (and when a dead sink is pruned); read on
//! dumps and broadcasts. Both reveal broadcasts and dumps go to
//! [`PermissionLevel::ADMIN`] observers only.

use std::collections::HashMap;

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;
use umbra_core::VoxelPos;

use crate::channel::ChannelId;
use crate::codec::encode_reveals;

/// Unique identifier for a client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

/// Command permission level of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermissionLevel(pub u8);

impl PermissionLevel {
    /// Ordinary player.
    pub const PLAYER: Self = Self(0);
    /// May trigger mask dumps and receive reveal updates.
    pub const ADMIN: Self = Self(2);

    /// Whether this level may see mask contents.
    #[inline]
    #[must_use]
    pub fn is_admin(self) -> bool {
        self >= Self::ADMIN
    }
}

/// A payload addressed to one diagnostic channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebugMessage {
    /// Channel to send on.
    pub channel: ChannelId,
    /// Encoded body.
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct Observer {
    permission: PermissionLevel,
    sink: Sender<DebugMessage>,
}

/// Opted-in diagnostic observers.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    observers: RwLock<HashMap<ConnectionId, Observer>>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles a connection join.
    ///
    /// The connection is registered only if `channels` includes the update
    /// channel. Returns whether it was registered.
    pub fn join<'a>(
        &self,
        id: ConnectionId,
        channels: impl IntoIterator<Item = &'a str>,
        permission: PermissionLevel,
        sink: Sender<DebugMessage>,
    ) -> bool {
        let opted_in = channels
            .into_iter()
            .any(|c| ChannelId::parse(c) == Some(ChannelId::UPDATE));
        if !opted_in {
            return false;
        }
        self.observers.write().insert(id, Observer { permission, sink });
        tracing::debug!("Connection {} registered as diagnostic observer", id.0);
        true
    }

    /// Handles a connection close. Returns whether it was an observer.
    pub fn leave(&self, id: ConnectionId) -> bool {
        let removed = self.observers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Diagnostic observer {} left", id.0);
        }
        removed
    }

    /// Updates an observer's permission level, e.g. after an operator change.
    pub fn set_permission(&self, id: ConnectionId, permission: PermissionLevel) -> bool {
        match self.observers.write().get_mut(&id) {
            Some(observer) => {
                observer.permission = permission;
                true
            }
            None => false,
        }
    }

    /// Returns true if `id` opted in.
    #[must_use]
    pub fn is_observer(&self, id: ConnectionId) -> bool {
        self.observers.read().contains_key(&id)
    }

    /// Permission level of an observer.
    #[must_use]
    pub fn permission(&self, id: ConnectionId) -> Option<PermissionLevel> {
        self.observers.read().get(&id).map(|o| o.permission)
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Returns true if nobody opted in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Sends to one observer. A disconnected sink is pruned.
    pub fn send(&self, id: ConnectionId, message: DebugMessage) -> bool {
        let result = match self.observers.read().get(&id) {
            Some(observer) => observer.sink.try_send(message),
            None => return false,
        };
        match result {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Diagnostic sink for {} is full, message dropped", id.0);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.prune(&[id]);
                false
            }
        }
    }

    /// Broadcasts revealed positions on the update channel to admin
    /// observers. Lower levels receive nothing.
    ///
    /// Returns the number of observers reached.
    pub fn publish_reveals(&self, revealed: &[VoxelPos]) -> usize {
        if revealed.is_empty() {
            return 0;
        }
        let payload = encode_reveals(revealed);

        let mut reached = 0;
        let mut dead = Vec::new();
        {
            let observers = self.observers.read();
            for (&id, observer) in observers.iter().filter(|(_, o)| o.permission.is_admin()) {
                let message = DebugMessage {
                    channel: ChannelId::UPDATE,
                    payload: payload.clone(),
                };
                match observer.sink.try_send(message) {
                    Ok(()) => reached += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("Diagnostic sink for {} is full, reveal update dropped", id.0);
                    }
                    Err(TrySendError::Disconnected(_)) => dead.push(id),
                }
            }
        }

        if !dead.is_empty() {
            self.prune(&dead);
        }
        reached
    }

    fn prune(&self, dead: &[ConnectionId]) {
        let mut observers = self.observers.write();
        for id in dead {
            if observers.remove(id).is_some() {
                tracing::warn!("Pruned diagnostic observer {}: sink disconnected", id.0);
            }
        }
    }
}
