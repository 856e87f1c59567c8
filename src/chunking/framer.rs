//! Chunk framer
//!
//! Length-field decoder for the 2-byte chunk header.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{BoltError, Result};
use super::{CHUNK_HEADER_SIZE, MAX_FRAME_LENGTH};

/// Strips chunk headers from a byte stream
///
/// Zero-length chunks are emitted as empty buffers; they mark message
/// boundaries and must reach the accumulator. The frame limit is fixed at
/// [`MAX_FRAME_LENGTH`]: the peer picks its own chunk sizes, independent of
/// the size this side writes with.
pub struct ChunkDecoder {
    buffer: BytesMut,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Append raw bytes from the wire
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Decode the next complete chunk body, if one is buffered
    pub fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.buffer.len() < CHUNK_HEADER_SIZE {
            return Ok(None);
        }

        let length = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;
        let frame_len = CHUNK_HEADER_SIZE + length;
        if frame_len > MAX_FRAME_LENGTH {
            return Err(BoltError::Framing(format!(
                "Frame too large: {} bytes (max {})",
                frame_len, MAX_FRAME_LENGTH
            )));
        }

        if self.buffer.len() < frame_len {
            self.buffer.reserve(frame_len - self.buffer.len());
            return Ok(None);
        }

        self.buffer.advance(CHUNK_HEADER_SIZE);
        Ok(Some(self.buffer.split_to(length).freeze()))
    }

    /// Number of bytes waiting for the rest of their chunk
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}
