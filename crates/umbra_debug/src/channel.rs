//! # Diagnostic Channels
//!
//! Side channels a debugging client may advertise on join.
//!
//! ```text
//! umbra-debug:set     client → server   reserved
//! umbra-debug:update  server → client   reveal broadcasts (opt-in marker)
//! umbra-debug:test    client → server   reserved
//! umbra-debug:mask    server → client   one-shot mask dumps
//! ```

use std::fmt;

/// Namespace shared by every diagnostic channel.
pub const NAMESPACE: &str = "umbra-debug";

/// A diagnostic channel identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(&'static str);

impl ChannelId {
    /// Reserved for client-initiated mask edits.
    pub const SET: Self = Self("umbra-debug:set");
    /// Reveal broadcasts. Advertising this channel opts a connection in.
    pub const UPDATE: Self = Self("umbra-debug:update");
    /// Reserved for client-initiated probes.
    pub const TEST: Self = Self("umbra-debug:test");
    /// Mask dumps.
    pub const MASK: Self = Self("umbra-debug:mask");

    /// Every known channel.
    pub const ALL: [Self; 4] = [Self::SET, Self::UPDATE, Self::TEST, Self::MASK];

    /// Full `namespace:path` identifier.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }

    /// Path part of the identifier (`"mask"` for [`ChannelId::MASK`]).
    #[must_use]
    pub fn path(self) -> &'static str {
        self.0.rsplit(':').next().unwrap_or(self.0)
    }

    /// Looks up a channel by its full identifier.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.0 == name)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
