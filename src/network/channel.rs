//! Channel writer
//!
//! Write half of a connection, shared between the connection and its
//! dispatcher (which sends RESET on its own).

use std::io::{BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::chunking::ChunkedWriter;
use crate::error::Result;
use crate::protocol::{MessageCodec, Request};
use super::dispatcher::OutboundChannel;

/// Encodes, chunks and writes requests
pub struct ChannelWriter<W: Write + Send = BufWriter<TcpStream>> {
    writer: Mutex<ChunkedWriter<W>>,
    codec: MessageCodec,
    auto_read: AtomicBool,
}

impl ChannelWriter {
    /// Buffered writer over a clone of the connection's stream
    pub fn for_stream(stream: TcpStream, codec: MessageCodec, max_chunk_size: usize) -> Self {
        Self::new(BufWriter::new(stream), codec, max_chunk_size)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.writer.lock().get_ref().get_ref().shutdown(Shutdown::Both)?;
        Ok(())
    }
}

impl<W: Write + Send> ChannelWriter<W> {
    pub fn new(writer: W, codec: MessageCodec, max_chunk_size: usize) -> Self {
        Self {
            writer: Mutex::new(ChunkedWriter::new(writer, max_chunk_size)),
            codec,
            auto_read: AtomicBool::new(true),
        }
    }

    /// Buffer one request without flushing
    pub fn write(&self, request: &Request) -> Result<()> {
        let body = self.codec.encode_request(request)?;
        tracing::trace!("C: {:?}", request.request_type());
        self.writer.lock().write(&body)
    }

    pub fn flush(&self) -> Result<()> {
        self.writer.lock().flush()
    }

    pub fn is_auto_read(&self) -> bool {
        self.auto_read.load(Ordering::Acquire)
    }

    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }
}

impl<W: Write + Send> OutboundChannel for ChannelWriter<W> {
    fn write_and_flush(&self, request: &Request) -> Result<()> {
        let body = self.codec.encode_request(request)?;
        tracing::trace!("C: {:?}", request.request_type());
        let mut writer = self.writer.lock();
        writer.write(&body)?;
        writer.flush()
    }

    fn set_auto_read(&self, enabled: bool) {
        self.auto_read.store(enabled, Ordering::Release);
    }
}
