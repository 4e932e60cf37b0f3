//! Error types for the diagnostic wire codec.

use thiserror::Error;

/// Errors raised while decoding a diagnostic payload.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpError {
    /// Payload ended before the message did.
    #[error("Payload truncated at byte {0}")]
    Truncated(usize),

    /// Varint ran past five bytes.
    #[error("Varint too long at byte {0}")]
    VarIntTooLong(usize),

    /// Declared word count does not cover exactly one section.
    #[error("Word count mismatch: expected {expected}, found {found}")]
    WordCountMismatch {
        /// Words per section.
        expected: usize,
        /// Declared count.
        found: usize,
    },

    /// Bytes left over after the message.
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// Result type for wire decoding.
pub type DumpResult<T> = Result<T, DumpError>;
