//! Bolt Connection
//!
//! One blocking TCP connection to a server.
//!
//! ## Lifecycle
//! ```text
//! connect ─▶ handshake ─▶ INIT ─▶ ready ─┬─▶ enqueue / process_incoming ...
//!  (timeout guard armed)  │              │
//!                  guard disarmed        └─▶ close / fatal fault
//! ```
//!
//! Requests are written through a [`ChannelWriter`]; responses are read by
//! [`BoltConnection::process_incoming`], framed by a [`MessageReader`] and
//! handed to the [`ResponseDispatcher`].

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crate::chunking::MessageReader;
use crate::config::Config;
use crate::error::{BoltError, Result};
use crate::packstream::Value;
use crate::protocol::{encode_handshake, parse_handshake_response, MessageCodec, Request};
use crate::routing::BoltServerAddress;
use super::channel::ChannelWriter;
use super::dispatcher::{
    DispatcherState, OutboundChannel, ResponseCollector, ResponseDispatcher, ResponseHandler,
};
use super::guard::{ChannelGuard, ConnectTimeoutGuard};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Result of RUN + PULL_ALL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Field names from the RUN metadata
    pub keys: Vec<String>,

    pub records: Vec<Vec<Value>>,

    /// Metadata of the PULL_ALL SUCCESS
    pub summary: BTreeMap<String, Value>,
}

impl QueryResult {
    /// Position of `key` in each record
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }
}

/// Anything that can run a query and collect its records
pub trait QueryRunner {
    fn run_query(&mut self, query: &str, parameters: BTreeMap<String, Value>) -> Result<QueryResult>;
}

/// A single client connection
pub struct BoltConnection {
    address: BoltServerAddress,

    /// Read half of the socket
    stream: TcpStream,
    read_buffer: Box<[u8]>,
    messages: MessageReader,

    channel: Arc<ChannelWriter>,
    dispatcher: ResponseDispatcher,
    guard: ChannelGuard,

    server_agent: Option<String>,
    open: bool,
}

impl BoltConnection {
    /// Connect, negotiate a protocol version and authenticate
    pub fn connect(address: &BoltServerAddress, config: &Config) -> Result<Self> {
        config.validate()?;
        let mut timeout = ConnectTimeoutGuard::new(config.connection_timeout());
        let unavailable = |e: BoltError| match e {
            BoltError::Io(io) => BoltError::ServiceUnavailable(format!(
                "Unable to connect to {}, ensure the database is running and that there is a \
                 working network connection to it: {}",
                address, io
            )),
            other => other,
        };

        let socket_addr = address.resolve().map_err(unavailable)?;
        let connected = match timeout.timeout() {
            Some(limit) => TcpStream::connect_timeout(&socket_addr, limit),
            None => TcpStream::connect(socket_addr),
        };
        let mut stream = connected.map_err(|e| unavailable(timeout.on_io_error(e)))?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        timeout.arm(&stream)?;
        tracing::debug!("Connected to {}", address);

        let version = Self::handshake(&mut stream, &mut timeout).map_err(unavailable)?;
        timeout.disarm(&stream)?;
        tracing::debug!("Negotiated protocol version {} with {}", version, address);

        let codec = MessageCodec::new(version)?;
        let channel = Arc::new(ChannelWriter::for_stream(
            stream.try_clone()?,
            codec,
            config.max_chunk_size,
        ));

        let mut connection = Self {
            address: address.clone(),
            stream,
            read_buffer: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            messages: MessageReader::new(config.cumulation),
            dispatcher: ResponseDispatcher::new(channel.clone()),
            channel,
            guard: ChannelGuard::new(),
            server_agent: None,
            open: true,
        };

        connection.init(config)?;
        Ok(connection)
    }

    fn handshake(stream: &mut TcpStream, timeout: &mut ConnectTimeoutGuard) -> Result<u32> {
        stream
            .write_all(&encode_handshake())
            .and_then(|_| stream.flush())
            .map_err(|e| timeout.on_io_error(e))?;

        let mut reply = [0u8; 4];
        stream
            .read_exact(&mut reply)
            .map_err(|e| timeout.on_io_error(e))?;
        parse_handshake_response(reply)
    }

    fn init(&mut self, config: &Config) -> Result<()> {
        let init = ResponseCollector::new();
        self.write_and_flush(Request::init(&config.user_agent, &config.auth), Box::new(init.clone()))?;
        self.wait_for(&init)?;

        match init.take().outcome {
            Some(Ok(metadata)) => {
                self.server_agent = metadata.get("server").and_then(Value::as_str).map(str::to_string);
                tracing::debug!(
                    "Initialized connection to {} ({})",
                    self.address,
                    self.server_agent.as_deref().unwrap_or("unknown server")
                );
                Ok(())
            }
            Some(Err(e)) => {
                self.close();
                Err(e)
            }
            None => Err(BoltError::Protocol("INIT completed without a response".to_string())),
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Queue `handler` and buffer `request`; call [`flush`](Self::flush) to send
    pub fn enqueue(&mut self, request: Request, handler: Box<dyn ResponseHandler>) -> Result<()> {
        if !self.dispatcher.enqueue(handler) {
            return Err(self.terminal_error());
        }
        self.channel.write(&request).map_err(|e| self.fail(e))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.channel.flush().map_err(|e| self.fail(e))
    }

    pub fn write_and_flush(&mut self, request: Request, handler: Box<dyn ResponseHandler>) -> Result<()> {
        self.enqueue(request, handler)?;
        self.flush()
    }

    /// Acknowledge any failure and wait until the server is idle again
    pub fn reset(&mut self) -> Result<()> {
        let reset = ResponseCollector::new();
        self.write_and_flush(Request::Reset, Box::new(reset.clone()))?;
        self.wait_for(&reset)?;
        match reset.take().outcome {
            Some(Ok(_)) => {
                self.dispatcher.clear_current_error();
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Err(self.terminal_error()),
        }
    }

    // =========================================================================
    // Responses
    // =========================================================================

    /// Read once from the socket and dispatch every completed message.
    ///
    /// Blocks until some bytes arrive. Returns without reading while a
    /// handler has switched auto-read off.
    pub fn process_incoming(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(self.terminal_error());
        }
        if !self.channel.is_auto_read() {
            tracing::trace!("Auto-read disabled on {}, not reading", self.address);
            return Ok(());
        }

        let read = self.stream.read(&mut self.read_buffer);
        let n = match read {
            Ok(0) => {
                self.guard.on_inactive(&mut self.dispatcher, None);
                self.shutdown();
                return Err(self.terminal_error());
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(self.fail(e.into())),
        };

        let messages = match self.messages.feed(&self.read_buffer[..n]) {
            Ok(messages) => messages,
            Err(e) => return Err(self.fail(e)),
        };

        for message in messages {
            let dispatched = self
                .channel
                .codec()
                .decode_response(message)
                .and_then(|response| {
                    tracing::trace!("S: {:?}", response.response_type());
                    self.dispatcher.dispatch(response)
                });
            if let Err(e) = dispatched {
                return Err(self.fail(e));
            }
        }
        Ok(())
    }

    /// Process input until `collector` has its terminal response.
    ///
    /// Fails instead of blocking forever while auto-read is switched off.
    pub fn wait_for(&mut self, collector: &ResponseCollector) -> Result<()> {
        while !collector.is_complete() {
            self.read_more()?;
        }
        Ok(())
    }

    /// Process input until no request awaits a response, including a RESET
    /// sent after a recoverable failure
    pub fn wait_until_idle(&mut self) -> Result<()> {
        while !self.is_idle() {
            self.read_more()?;
        }
        Ok(())
    }

    fn read_more(&mut self) -> Result<()> {
        if !self.channel.is_auto_read() {
            return Err(BoltError::Client(format!(
                "Auto-read is disabled on the connection to {}, responses cannot be awaited",
                self.address
            )));
        }
        self.process_incoming()
    }

    /// Pause or resume reading from the socket
    pub fn set_auto_read(&self, enabled: bool) {
        self.channel.set_auto_read(enabled);
    }

    // =========================================================================
    // State
    // =========================================================================

    pub fn is_open(&self) -> bool {
        self.open && self.dispatcher.state() != DispatcherState::Fatal
    }

    /// No requests are awaiting a response
    pub fn is_idle(&self) -> bool {
        self.dispatcher.queued_count() == 0
    }

    pub fn dispatcher_state(&self) -> DispatcherState {
        self.dispatcher.state()
    }

    pub fn address(&self) -> &BoltServerAddress {
        &self.address
    }

    pub fn protocol_version(&self) -> u32 {
        self.channel.codec().version()
    }

    pub fn server_agent(&self) -> Option<&str> {
        self.server_agent.as_deref()
    }

    /// Close the socket, failing anything still queued
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        tracing::debug!("Closing connection to {}", self.address);
        self.guard
            .on_inactive(&mut self.dispatcher, Some("Connection has been closed by the client."));
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.open = false;
        if let Err(e) = self.channel.shutdown() {
            tracing::trace!("Error shutting down socket to {}: {}", self.address, e);
        }
    }

    /// Route a fault through the guard and close the socket
    fn fail(&mut self, error: BoltError) -> BoltError {
        let error = self.guard.on_exception(&mut self.dispatcher, error);
        tracing::warn!("Connection to {} failed: {}", self.address, error);
        self.shutdown();
        error
    }

    fn terminal_error(&self) -> BoltError {
        self.dispatcher.fatal_error().cloned().unwrap_or_else(|| {
            BoltError::ServiceUnavailable(format!("Connection to {} is closed", self.address))
        })
    }
}

impl QueryRunner for BoltConnection {
    /// RUN followed by PULL_ALL, pipelined
    fn run_query(&mut self, query: &str, parameters: BTreeMap<String, Value>) -> Result<QueryResult> {
        let run = ResponseCollector::new();
        let pull = ResponseCollector::new();
        self.enqueue(Request::run(query, parameters), Box::new(run.clone()))?;
        self.enqueue(Request::PullAll, Box::new(pull.clone()))?;
        self.flush()?;
        self.wait_for(&pull)?;

        let run = run.take();
        let pull = pull.take();
        let run_metadata = run.outcome.unwrap_or_else(|| Err(self.terminal_error()))?;
        let summary = pull.outcome.unwrap_or_else(|| Err(self.terminal_error()))?;

        let keys = match run_metadata.get("fields").and_then(Value::as_list) {
            Some(fields) => fields
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        Ok(QueryResult {
            keys,
            records: pull.records,
            summary,
        })
    }
}

impl Drop for BoltConnection {
    fn drop(&mut self) {
        self.close();
    }
}
