//! Message boundary accumulator
//!
//! Collects chunk bodies until the zero-length terminator arrives.

use bytes::{Bytes, BytesMut};

use crate::config::Cumulation;

/// Strategy for collecting the chunk bodies of one message
pub trait Cumulator: Send {
    /// Add a non-empty chunk body
    fn cumulate(&mut self, chunk: Bytes);

    /// Take the collected message, leaving the cumulator empty
    fn take(&mut self) -> Bytes;

    /// Number of bytes collected so far
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Copies every chunk into one contiguous buffer as it arrives
#[derive(Default)]
pub struct MergeCumulator {
    buffer: BytesMut,
}

impl Cumulator for MergeCumulator {
    fn cumulate(&mut self, chunk: Bytes) {
        self.buffer.extend_from_slice(&chunk);
    }

    fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }
}

/// Holds chunk buffers as-is; a single-chunk message is handed out without
/// copying, multi-chunk messages are joined once at the boundary
#[derive(Default)]
pub struct CompositeCumulator {
    parts: Vec<Bytes>,
    len: usize,
}

impl Cumulator for CompositeCumulator {
    fn cumulate(&mut self, chunk: Bytes) {
        self.len += chunk.len();
        self.parts.push(chunk);
    }

    fn take(&mut self) -> Bytes {
        self.len = 0;
        if self.parts.len() == 1 {
            return self.parts.pop().unwrap_or_default();
        }

        let total = self.parts.iter().map(Bytes::len).sum();
        let mut joined = BytesMut::with_capacity(total);
        for part in self.parts.drain(..) {
            joined.extend_from_slice(&part);
        }
        joined.freeze()
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Emits one buffer per complete message
pub struct MessageAccumulator {
    cumulator: Box<dyn Cumulator>,

    /// Whether the previous chunk was a zero-length terminator
    read_message_boundary: bool,
}

impl MessageAccumulator {
    pub fn new(cumulation: Cumulation) -> Self {
        let cumulator: Box<dyn Cumulator> = match cumulation {
            Cumulation::Merge => Box::new(MergeCumulator::default()),
            Cumulation::Composite => Box::new(CompositeCumulator::default()),
        };
        Self::with_cumulator(cumulator)
    }

    pub fn with_cumulator(cumulator: Box<dyn Cumulator>) -> Self {
        Self {
            cumulator,
            read_message_boundary: true,
        }
    }

    /// Process one chunk body from the framer.
    ///
    /// Returns the complete message when `chunk` is the terminator of a
    /// message that carried at least one byte.
    pub fn on_chunk(&mut self, chunk: Bytes) -> Option<Bytes> {
        if chunk.is_empty() {
            self.read_message_boundary = true;
            if self.cumulator.is_empty() {
                tracing::trace!("Received NOOP chunk");
                return None;
            }
            return Some(self.cumulator.take());
        }

        self.read_message_boundary = false;
        self.cumulator.cumulate(chunk);
        None
    }

    /// Whether the last chunk seen was a message terminator
    pub fn at_message_boundary(&self) -> bool {
        self.read_message_boundary
    }

    /// Bytes of the message currently being collected
    pub fn buffered(&self) -> usize {
        self.cumulator.len()
    }
}
