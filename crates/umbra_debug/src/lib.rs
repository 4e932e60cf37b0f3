//! # UMBRA Debug - Diagnostic Export Protocol
//!
//! Lets an opted-in debugging client see the raw masks.
//!
//! ```text
//! join(channels) ──► ObserverRegistry ◄── leave
//!                        │
//! dump command ──► MaskDumper ──► MaskDump::encode ──► umbra-debug:mask
//! reveal events ─────────┴──────► encode_reveals   ──► umbra-debug:update
//!
//! client side: DumpReceiver ◄── umbra-debug:mask
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod channel;
pub mod codec;
pub mod dump;
pub mod error;
pub mod registry;

pub use channel::{ChannelId, NAMESPACE};
pub use codec::{decode_reveals, encode_reveals, DumpReader, DumpReceiver, DumpWriter, MaskDump};
pub use dump::{DumpStatus, MaskDumper};
pub use error::{DumpError, DumpResult};
pub use registry::{ConnectionId, DebugMessage, ObserverRegistry, PermissionLevel};
