//! Chunked output
//!
//! Splits an encoded message into chunks and appends the terminator.

use std::io::Write;

use bytes::{BufMut, BytesMut};

use crate::error::Result;
use super::{CHUNK_HEADER_SIZE, MAX_CHUNK_SIZE, MESSAGE_BOUNDARY};

/// Append `payload` to `out` as a chunked message
///
/// Format: (len (2) + body)* + 0x0000
pub fn write_message(payload: &[u8], max_chunk_size: usize, out: &mut BytesMut) {
    let max_chunk_size = max_chunk_size.clamp(1, MAX_CHUNK_SIZE);
    let chunk_count = payload.len().div_ceil(max_chunk_size);
    out.reserve(payload.len() + (chunk_count + 1) * CHUNK_HEADER_SIZE);

    for chunk in payload.chunks(max_chunk_size) {
        out.put_u16(chunk.len() as u16);
        out.put_slice(chunk);
    }
    out.put_slice(&MESSAGE_BOUNDARY);
}

/// Writes chunked messages to a stream
pub struct ChunkedWriter<W: Write> {
    writer: W,
    max_chunk_size: usize,
    scratch: BytesMut,
}

impl<W: Write> ChunkedWriter<W> {
    pub fn new(writer: W, max_chunk_size: usize) -> Self {
        Self {
            writer,
            max_chunk_size,
            scratch: BytesMut::new(),
        }
    }

    /// Chunk and buffer one message
    pub fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.scratch.clear();
        write_message(payload, self.max_chunk_size, &mut self.scratch);
        self.writer.write_all(&self.scratch)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}
