//! Chunking Module
//!
//! Bolt-style message framing.
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬──────────────┬──────────┬──────────────┬──────────┐
//! │ Len (2)  │ Body (≤64K)  │ Len (2)  │ Body (≤64K)  │ 0x0000   │
//! └──────────┴──────────────┴──────────┴──────────────┴──────────┘
//!  chunk 1                   chunk N                   terminator
//! ```
//!
//! - Length prefixes are big-endian `u16`
//! - A message has any number of chunks and ends with a zero-length chunk
//! - A lone zero-length chunk with nothing before it is a NOOP keep-alive
//!
//! Inbound bytes flow through [`ChunkDecoder`] (strips prefixes, emits chunk
//! bodies including empty terminators) and then [`MessageAccumulator`]
//! (joins bodies up to the terminator). [`MessageReader`] wires the two.

mod framer;
mod accumulator;
mod writer;

use bytes::Bytes;

use crate::config::Cumulation;
use crate::error::Result;

pub use framer::ChunkDecoder;
pub use accumulator::{CompositeCumulator, Cumulator, MergeCumulator, MessageAccumulator};
pub use writer::{write_message, ChunkedWriter};

/// Chunk header size: 2 byte big-endian length
pub const CHUNK_HEADER_SIZE: usize = 2;

/// Largest chunk body the wire format can describe
pub const MAX_CHUNK_SIZE: usize = 0xFFFF;

/// Largest frame the decoder accepts: header + body
pub const MAX_FRAME_LENGTH: usize = CHUNK_HEADER_SIZE + MAX_CHUNK_SIZE;

/// The zero-length chunk that ends every message
pub const MESSAGE_BOUNDARY: [u8; 2] = [0x00, 0x00];

/// Turns a raw byte stream into complete messages
pub struct MessageReader {
    decoder: ChunkDecoder,
    accumulator: MessageAccumulator,
}

impl MessageReader {
    pub fn new(cumulation: Cumulation) -> Self {
        Self {
            decoder: ChunkDecoder::new(),
            accumulator: MessageAccumulator::new(cumulation),
        }
    }

    /// Feed bytes read from the wire and return every message they complete.
    ///
    /// Bytes belonging to an unfinished chunk or message are retained until
    /// the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Bytes>> {
        self.decoder.extend(bytes);

        let mut messages = Vec::new();
        while let Some(chunk) = self.decoder.next_chunk()? {
            if let Some(message) = self.accumulator.on_chunk(chunk) {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    /// Bytes buffered but not yet part of a complete message
    pub fn pending_bytes(&self) -> usize {
        self.decoder.buffered() + self.accumulator.buffered()
    }
}

impl Default for MessageReader {
    fn default() -> Self {
        Self::new(Cumulation::Merge)
    }
}
