//! Connection lifecycle guards
//!
//! [`ChannelGuard`] turns socket faults into exactly one fatal error on the
//! dispatcher. [`ConnectTimeoutGuard`] bounds connect + handshake time.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{BoltError, Result};
use super::dispatcher::ResponseDispatcher;

/// Routes the first fault on a connection to its dispatcher
#[derive(Debug, Default)]
pub struct ChannelGuard {
    failed: bool,
}

impl ChannelGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// The peer closed the connection or it was torn down.
    ///
    /// Without a prior fault this synthesizes a service-unavailable error
    /// carrying `reason`.
    pub fn on_inactive(&mut self, dispatcher: &mut ResponseDispatcher, reason: Option<&str>) {
        if self.failed {
            tracing::debug!("Channel inactive after a fault was already handled");
            return;
        }
        self.failed = true;

        let mut message = String::from("Connection to the database terminated.");
        if let Some(reason) = reason {
            message.push(' ');
            message.push_str(reason);
        }
        dispatcher.handle_channel_error(BoltError::ServiceUnavailable(message));
    }

    /// A fault occurred while reading, decoding or dispatching.
    ///
    /// Returns the error as delivered to the dispatcher.
    pub fn on_exception(&mut self, dispatcher: &mut ResponseDispatcher, error: BoltError) -> BoltError {
        if self.failed {
            tracing::warn!("Another fatal error occurred on the channel: {}", error);
            return error;
        }
        self.failed = true;

        let error = transform_error(error);
        tracing::debug!("Fatal error occurred on the channel: {}", error);
        dispatcher.handle_channel_error(error.clone());
        error
    }
}

fn transform_error(error: BoltError) -> BoltError {
    match error {
        BoltError::Io(io) => BoltError::ServiceUnavailable(format!(
            "Connection to the database failed: {}",
            io
        )),
        other => other,
    }
}

// =============================================================================
// Connect Timeout
// =============================================================================

/// Socket timeout active between connect and handshake completion
#[derive(Debug)]
pub struct ConnectTimeoutGuard {
    timeout: Option<Duration>,
    armed: bool,
    fired: bool,
}

impl ConnectTimeoutGuard {
    /// A zero timeout disables the guard
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: (!timeout.is_zero()).then_some(timeout),
            armed: false,
            fired: false,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn arm(&mut self, stream: &TcpStream) -> Result<()> {
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        self.armed = true;
        Ok(())
    }

    /// Remove the timeout once the handshake is done
    pub fn disarm(&mut self, stream: &TcpStream) -> Result<()> {
        if self.armed {
            stream.set_read_timeout(None)?;
            stream.set_write_timeout(None)?;
            self.armed = false;
        }
        Ok(())
    }

    /// Map an I/O error seen while armed.
    ///
    /// The first timeout becomes service-unavailable; anything else, and any
    /// timeout after that, passes through.
    pub fn on_io_error(&mut self, error: io::Error) -> BoltError {
        let timed_out = matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut);
        match self.timeout {
            Some(timeout) if timed_out && !self.fired => {
                self.fired = true;
                BoltError::ServiceUnavailable(format!(
                    "Unable to establish connection in {}ms",
                    timeout.as_millis()
                ))
            }
            _ => BoltError::from(error),
        }
    }
}
