//! # Dump Wire Codec
//!
//! ## Mask dump (`umbra-debug:mask`)
//!
//! ```text
//! chunkX        varint
//! chunkZ        varint
//! sectionCount  varint
//! per section:
//!     isEmpty   varint   0 = mask follows, nonzero = fully revealed
//!     wordCount varint   only if a mask follows, always 64
//!     words     wordCount × u64 little-endian
//! ```
//!
//! ## Reveal update (`umbra-debug:update`)
//!
//! ```text
//! count  varint
//! per position: x varint, y varint, z varint
//! ```
//!
//! Varints are 7-bit groups, low first, high bit set on every byte but the
//! last, at most 5 bytes. Negative values travel as their two's-complement
//! `u32`.

use std::collections::HashMap;

use umbra_core::{ChunkCoord, MaskSnapshot, ShadowMask, ShadowReader, VoxelPos, MASK_WORDS};

use crate::error::{DumpError, DumpResult};

const MAX_VARINT_BYTES: usize = 5;

/// Payload bits a fifth varint byte may carry: 32 - 4 * 7.
const LAST_VARINT_BITS: u8 = 0x0F;
const WORD_BYTES: usize = 8;

/// Growable little-endian writer for diagnostic payloads.
#[derive(Debug, Default)]
pub struct DumpWriter {
    buffer: Vec<u8>,
}

impl DumpWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes an unsigned varint.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_varint(&mut self, mut value: u32) {
        while value >= 0x80 {
            self.buffer.push((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buffer.push(value as u8);
    }

    /// Writes a signed value as the varint of its two's-complement bits.
    #[inline]
    #[allow(clippy::cast_sign_loss)]
    pub fn write_varint_i32(&mut self, value: i32) {
        self.write_varint(value as u32);
    }

    /// Writes a u64 in little-endian format.
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a length as a varint.
    #[allow(clippy::cast_possible_truncation)]
    fn write_len(&mut self, len: usize) {
        self.write_varint(len as u32);
    }
}

/// Reader over a received diagnostic payload.
#[derive(Debug)]
pub struct DumpReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> DumpReader<'a> {
    /// Creates a reader over `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Bytes not yet consumed.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Reads one byte.
    #[inline]
    pub fn read_u8(&mut self) -> DumpResult<u8> {
        let byte = *self
            .buffer
            .get(self.position)
            .ok_or(DumpError::Truncated(self.position))?;
        self.position += 1;
        Ok(byte)
    }

    /// Reads an unsigned varint.
    ///
    /// # Errors
    ///
    /// [`DumpError::Truncated`], or [`DumpError::VarIntTooLong`] for more
    /// than five bytes or a fifth byte carrying bits beyond 32.
    pub fn read_varint(&mut self) -> DumpResult<u32> {
        let start = self.position;
        let mut value = 0u32;
        for shift in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8()?;
            if shift == MAX_VARINT_BYTES - 1 && byte > LAST_VARINT_BITS {
                return Err(DumpError::VarIntTooLong(start));
            }
            value |= u32::from(byte & 0x7F) << (7 * shift);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DumpError::VarIntTooLong(start))
    }

    /// Reads a varint as a signed value.
    ///
    /// # Errors
    ///
    /// As [`DumpReader::read_varint`].
    #[inline]
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_varint_i32(&mut self) -> DumpResult<i32> {
        self.read_varint().map(|v| v as i32)
    }

    /// Reads a u64 in little-endian format.
    ///
    /// # Errors
    ///
    /// [`DumpError::Truncated`] if fewer than 8 bytes remain.
    pub fn read_u64(&mut self) -> DumpResult<u64> {
        let bytes: [u8; WORD_BYTES] = self
            .buffer
            .get(self.position..self.position + WORD_BYTES)
            .and_then(|b| b.try_into().ok())
            .ok_or(DumpError::Truncated(self.position))?;
        self.position += WORD_BYTES;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Fails if anything is left unread.
    ///
    /// # Errors
    ///
    /// [`DumpError::TrailingBytes`].
    pub fn finish(self) -> DumpResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DumpError::TrailingBytes(n)),
        }
    }
}

// =============================================================================
// MASK DUMPS
// =============================================================================

/// Every section mask of one chunk, as sent to a debugging client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskDump {
    /// Chunk the masks belong to.
    pub chunk: ChunkCoord,
    /// One entry per section, bottom first. `None` is fully revealed.
    pub sections: Vec<MaskSnapshot>,
}

impl MaskDump {
    /// Snapshots a resident chunk. `None` if the chunk is not resident.
    #[must_use]
    pub fn capture(reader: &ShadowReader, chunk: ChunkCoord) -> Option<Self> {
        let sections = reader
            .mask_snapshots(chunk)?
            .into_iter()
            .map(|(_, mask)| mask)
            .collect();
        Some(Self { chunk, sections })
    }

    /// Whether the voxel at `index` of section `slot` is hidden in this dump.
    #[must_use]
    pub fn is_hidden(&self, slot: usize, index: usize) -> bool {
        self.sections
            .get(slot)
            .and_then(Option::as_ref)
            .is_some_and(|m| m.is_hidden(index))
    }

    /// Hidden voxels across the whole dump.
    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.sections
            .iter()
            .flatten()
            .map(|m| m.hidden_count())
            .sum()
    }

    /// Serializes the dump.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let present = self.sections.iter().flatten().count();
        let mut writer =
            DumpWriter::with_capacity(16 + self.sections.len() * 2 + present * MASK_WORDS * WORD_BYTES);

        writer.write_varint_i32(self.chunk.x);
        writer.write_varint_i32(self.chunk.z);
        writer.write_len(self.sections.len());
        for section in &self.sections {
            match section {
                Some(mask) => {
                    writer.write_varint(0);
                    writer.write_len(mask.words().len());
                    for &word in mask.words() {
                        writer.write_u64(word);
                    }
                }
                None => writer.write_varint(1),
            }
        }
        writer.into_bytes()
    }

    /// Parses a dump.
    ///
    /// # Errors
    ///
    /// [`DumpError::WordCountMismatch`] if a section declares anything other
    /// than one section's worth of words; otherwise truncation, overlong
    /// varint or trailing bytes.
    pub fn decode(payload: &[u8]) -> DumpResult<Self> {
        let mut reader = DumpReader::new(payload);
        let chunk = ChunkCoord::new(reader.read_varint_i32()?, reader.read_varint_i32()?);
        let count = reader.read_varint()? as usize;

        let mut sections = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            if reader.read_varint()? != 0 {
                sections.push(None);
                continue;
            }
            let found = reader.read_varint()? as usize;
            if found != MASK_WORDS {
                return Err(DumpError::WordCountMismatch {
                    expected: MASK_WORDS,
                    found,
                });
            }
            let words = (0..found)
                .map(|_| reader.read_u64())
                .collect::<DumpResult<Vec<u64>>>()?;
            let mask = ShadowMask::from_words(words).map_err(|_| DumpError::WordCountMismatch {
                expected: MASK_WORDS,
                found,
            })?;
            sections.push(mask.into_snapshot());
        }

        reader.finish()?;
        Ok(Self { chunk, sections })
    }
}

// =============================================================================
// REVEAL UPDATES
// =============================================================================

/// Serializes a batch of revealed positions.
#[must_use]
pub fn encode_reveals(positions: &[VoxelPos]) -> Vec<u8> {
    let mut writer = DumpWriter::with_capacity(1 + positions.len() * 6);
    writer.write_len(positions.len());
    for pos in positions {
        writer.write_varint_i32(pos.x);
        writer.write_varint_i32(pos.y);
        writer.write_varint_i32(pos.z);
    }
    writer.into_bytes()
}

/// Parses a batch of revealed positions.
///
/// # Errors
///
/// Truncation, overlong varint or trailing bytes.
pub fn decode_reveals(payload: &[u8]) -> DumpResult<Vec<VoxelPos>> {
    let mut reader = DumpReader::new(payload);
    let count = reader.read_varint()? as usize;
    let mut out = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        out.push(VoxelPos::new(
            reader.read_varint_i32()?,
            reader.read_varint_i32()?,
            reader.read_varint_i32()?,
        ));
    }
    reader.finish()?;
    Ok(out)
}

// =============================================================================
// CLIENT SIDE
// =============================================================================

/// Debugging-client side of the mask channel.
///
/// Keeps the latest dump per chunk. Malformed payloads are logged and dropped.
#[derive(Debug, Default)]
pub struct DumpReceiver {
    dumps: HashMap<ChunkCoord, MaskDump>,
    discarded: u64,
}

impl DumpReceiver {
    /// Creates an empty receiver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one payload from `umbra-debug:mask`.
    ///
    /// Returns the chunk the dump described, or `None` if it was discarded.
    pub fn receive(&mut self, payload: &[u8]) -> Option<ChunkCoord> {
        match MaskDump::decode(payload) {
            Ok(dump) => {
                let chunk = dump.chunk;
                tracing::debug!(
                    "Mask dump for chunk [{},{}]: {} sections, {} hidden",
                    chunk.x,
                    chunk.z,
                    dump.sections.len(),
                    dump.hidden_count()
                );
                self.dumps.insert(chunk, dump);
                Some(chunk)
            }
            Err(e) => {
                self.discarded += 1;
                tracing::warn!("Discarding malformed mask dump ({} bytes): {}", payload.len(), e);
                None
            }
        }
    }

    /// Latest dump received for `chunk`.
    #[must_use]
    pub fn latest(&self, chunk: ChunkCoord) -> Option<&MaskDump> {
        self.dumps.get(&chunk)
    }

    /// Payloads dropped as malformed.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}
