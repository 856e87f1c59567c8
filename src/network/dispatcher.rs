//! Response Dispatcher
//!
//! Correlates inbound responses with outstanding requests on one connection.
//!
//! ## State Machine
//! ```text
//!            recoverable FAILURE
//!   ┌────────┐ ──────────────────▶ ┌──────────┐
//!   │ Active │                     │ Degraded │  (RESET in flight)
//!   └────────┘ ◀────────────────── └──────────┘
//!       │        RESET completed        │
//!       │                               │
//!       └───────── channel fault ───────┴──────▶ ┌───────┐
//!                                                │ Fatal │  (terminal)
//!                                                └───────┘
//! ```
//!
//! Requests are answered strictly in the order they were written, so the
//! pending handlers form a FIFO queue: RECORD peeks the head, every other
//! response pops it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BoltError, Result};
use crate::packstream::Value;
use crate::protocol::{Request, Response};

/// Identifies a handler while it is queued
pub type HandlerId = u64;

/// Receives the responses to one request.
///
/// Exactly one of `on_success` / `on_failure` is called, preceded by zero or
/// more `on_record` calls.
pub trait ResponseHandler: Send {
    fn on_success(&mut self, metadata: BTreeMap<String, Value>);

    fn on_record(&mut self, fields: Vec<Value>);

    fn on_failure(&mut self, error: BoltError);

    /// Whether this handler throttles reading while it consumes records
    fn can_manage_auto_read(&self) -> bool {
        false
    }

    /// Stop touching the auto-read flag; another handler owns it now
    fn disable_auto_read_management(&mut self) {}
}

/// Write side of a connection, as seen by the dispatcher
pub trait OutboundChannel: Send + Sync {
    fn write_and_flush(&self, request: &Request) -> Result<()>;

    /// Toggle reading from the socket
    fn set_auto_read(&self, enabled: bool);
}

/// Observable dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Active,
    Degraded,
    Fatal,
}

enum Entry {
    External(Box<dyn ResponseHandler>),

    /// RESET sent by the dispatcher itself after a recoverable failure
    Reset,
}

struct Pending {
    id: HandlerId,
    entry: Entry,
}

/// Per-connection response dispatcher
pub struct ResponseDispatcher {
    handlers: VecDeque<Pending>,
    next_id: HandlerId,

    /// Recoverable failure awaiting RESET acknowledgement
    current_error: Option<BoltError>,

    /// Set once; the dispatcher never leaves Fatal
    fatal_error: Option<BoltError>,

    /// Faults reported after the fatal one
    suppressed: Vec<BoltError>,

    auto_read_owner: Option<HandlerId>,
    channel: Arc<dyn OutboundChannel>,
}

impl ResponseDispatcher {
    pub fn new(channel: Arc<dyn OutboundChannel>) -> Self {
        Self {
            handlers: VecDeque::new(),
            next_id: 0,
            current_error: None,
            fatal_error: None,
            suppressed: Vec::new(),
            auto_read_owner: None,
            channel,
        }
    }

    pub fn state(&self) -> DispatcherState {
        if self.fatal_error.is_some() {
            DispatcherState::Fatal
        } else if self.current_error.is_some() {
            DispatcherState::Degraded
        } else {
            DispatcherState::Active
        }
    }

    /// Number of requests still awaiting a terminal response
    pub fn queued_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn current_error(&self) -> Option<&BoltError> {
        self.current_error.as_ref()
    }

    pub fn fatal_error(&self) -> Option<&BoltError> {
        self.fatal_error.as_ref()
    }

    pub fn suppressed_errors(&self) -> &[BoltError] {
        &self.suppressed
    }

    // =========================================================================
    // Enqueue
    // =========================================================================

    /// Queue a handler for the next request written to the channel.
    ///
    /// Returns false if the dispatcher is fatal; the handler has then already
    /// been failed with the stored error.
    pub fn enqueue(&mut self, mut handler: Box<dyn ResponseHandler>) -> bool {
        if let Some(error) = &self.fatal_error {
            handler.on_failure(error.clone());
            return false;
        }

        let id = self.allocate_id();
        let manages_auto_read = handler.can_manage_auto_read();
        self.handlers.push_back(Pending {
            id,
            entry: Entry::External(handler),
        });
        if manages_auto_read {
            self.take_auto_read_ownership(id);
        }
        true
    }

    fn enqueue_reset(&mut self) {
        let id = self.allocate_id();
        self.handlers.push_back(Pending {
            id,
            entry: Entry::Reset,
        });
    }

    fn allocate_id(&mut self) -> HandlerId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // =========================================================================
    // Inbound Messages
    // =========================================================================

    /// Route one decoded response.
    ///
    /// An `Err` is a channel fault the caller must report through the guard.
    pub fn dispatch(&mut self, response: Response) -> Result<()> {
        match response {
            Response::Success { metadata } => self.on_success(metadata),
            Response::Record { fields } => self.on_record(fields),
            Response::Ignored => self.on_ignored(),
            Response::Failure { code, message } => self.on_failure(&code, &message),
        }
    }

    pub fn on_success(&mut self, metadata: BTreeMap<String, Value>) -> Result<()> {
        let pending = self.remove_head("SUCCESS")?;
        self.complete(pending, Ok(metadata));
        Ok(())
    }

    pub fn on_record(&mut self, fields: Vec<Value>) -> Result<()> {
        match self.handlers.front_mut() {
            Some(Pending { entry: Entry::External(handler), .. }) => {
                handler.on_record(fields);
                Ok(())
            }
            Some(Pending { entry: Entry::Reset, .. }) => {
                tracing::warn!("RECORD received while RESET was in flight; ignoring");
                Ok(())
            }
            None => Err(empty_queue("RECORD")),
        }
    }

    /// Handle a FAILURE.
    ///
    /// A fatal failure is returned without popping the head so the caller
    /// can fail the whole connection. A recoverable failure moves to
    /// Degraded, writes RESET, then fails the head handler.
    pub fn on_failure(&mut self, code: &str, message: &str) -> Result<()> {
        let error = BoltError::server(code, message);
        if error.is_fatal() {
            tracing::debug!("Fatal failure received: {}", error);
            return Err(error);
        }

        if self.handlers.is_empty() {
            return Err(empty_queue("FAILURE"));
        }

        self.current_error = Some(error.clone());
        self.enqueue_reset();
        tracing::debug!("Recoverable failure received, sending RESET: {}", error);
        let written = self.channel.write_and_flush(&Request::Reset);

        let pending = self.remove_head("FAILURE")?;
        self.complete(pending, Err(error));
        written
    }

    pub fn on_ignored(&mut self) -> Result<()> {
        let pending = self.remove_head("IGNORED")?;
        let error = match &self.current_error {
            Some(error) => error.clone(),
            None => {
                tracing::warn!("Received IGNORED but no failure is pending and RESET is not in progress");
                BoltError::RequestIgnored
            }
        };
        self.complete(pending, Err(error));
        Ok(())
    }

    /// Leave Degraded once the dispatcher's own RESET has been answered
    pub fn clear_current_error(&mut self) {
        self.current_error = None;
    }

    // =========================================================================
    // Channel Faults
    // =========================================================================

    /// Latch a fatal fault and fail every queued handler in FIFO order.
    ///
    /// Only the first fault is delivered; later ones are kept as suppressed.
    pub fn handle_channel_error(&mut self, error: BoltError) {
        if self.fatal_error.is_some() {
            tracing::warn!("Channel error after fatal failure was already handled: {}", error);
            self.suppressed.push(error);
            return;
        }

        tracing::debug!("Failing {} queued handlers: {}", self.handlers.len(), error);
        self.fatal_error = Some(error.clone());
        self.current_error = Some(error.clone());

        while let Some(mut pending) = self.handlers.pop_front() {
            self.release_auto_read(&mut pending);
            self.complete(pending, Err(error.clone()));
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn remove_head(&mut self, message: &str) -> Result<Pending> {
        let mut pending = self
            .handlers
            .pop_front()
            .ok_or_else(|| empty_queue(message))?;
        self.release_auto_read(&mut pending);
        Ok(pending)
    }

    fn complete(&mut self, pending: Pending, outcome: std::result::Result<BTreeMap<String, Value>, BoltError>) {
        match pending.entry {
            Entry::External(mut handler) => match outcome {
                Ok(metadata) => handler.on_success(metadata),
                Err(error) => handler.on_failure(error),
            },
            Entry::Reset => {
                if let Err(error) = &outcome {
                    tracing::debug!("RESET failed: {}", error);
                }
                self.clear_current_error();
            }
        }
    }

    /// Make `id` the only handler managing auto-read
    fn take_auto_read_ownership(&mut self, id: HandlerId) {
        if let Some(previous) = self.auto_read_owner.replace(id) {
            if let Some(Pending { entry: Entry::External(handler), .. }) =
                self.handlers.iter_mut().find(|p| p.id == previous)
            {
                handler.disable_auto_read_management();
            }
            self.channel.set_auto_read(true);
        }
    }

    /// Drop ownership held by a handler that is leaving the queue
    fn release_auto_read(&mut self, pending: &mut Pending) {
        if self.auto_read_owner != Some(pending.id) {
            return;
        }
        if let Entry::External(handler) = &mut pending.entry {
            handler.disable_auto_read_management();
        }
        self.auto_read_owner = None;
        self.channel.set_auto_read(true);
    }
}

fn empty_queue(message: &str) -> BoltError {
    tracing::error!("{} received with no handler queued", message);
    BoltError::Protocol(format!(
        "Received {} but no response handler is queued",
        message
    ))
}

// =============================================================================
// Collecting Handler
// =============================================================================

/// Everything delivered to a [`ResponseCollector`]
#[derive(Debug, Default)]
pub struct Collected {
    pub records: Vec<Vec<Value>>,
    pub outcome: Option<std::result::Result<BTreeMap<String, Value>, BoltError>>,
}

/// Handler that stores what it receives behind a shared lock.
///
/// Clones share the same storage: queue one clone, keep another to read the
/// result.
#[derive(Clone, Default)]
pub struct ResponseCollector {
    inner: Arc<Mutex<Collected>>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal response has been delivered
    pub fn is_complete(&self) -> bool {
        self.inner.lock().outcome.is_some()
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Take everything collected so far
    pub fn take(&self) -> Collected {
        std::mem::take(&mut *self.inner.lock())
    }
}

impl ResponseHandler for ResponseCollector {
    fn on_success(&mut self, metadata: BTreeMap<String, Value>) {
        self.inner.lock().outcome = Some(Ok(metadata));
    }

    fn on_record(&mut self, fields: Vec<Value>) {
        self.inner.lock().records.push(fields);
    }

    fn on_failure(&mut self, error: BoltError) {
        self.inner.lock().outcome = Some(Err(error));
    }
}
