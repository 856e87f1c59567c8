//! Guard Tests
//!
//! Tests for channel fault handling and the connect timeout guard.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use boltlink::error::BoltError;
use boltlink::network::{
    ChannelGuard, ConnectTimeoutGuard, DispatcherState, OutboundChannel, ResponseCollector,
    ResponseDispatcher,
};
use boltlink::protocol::Request;
use boltlink::Result;

struct NullChannel;

impl OutboundChannel for NullChannel {
    fn write_and_flush(&self, _request: &Request) -> Result<()> {
        Ok(())
    }

    fn set_auto_read(&self, _enabled: bool) {}
}

fn dispatcher_with(collector: &ResponseCollector) -> ResponseDispatcher {
    let mut dispatcher = ResponseDispatcher::new(Arc::new(NullChannel));
    dispatcher.enqueue(Box::new(collector.clone()));
    dispatcher
}

fn failure_of(collector: &ResponseCollector) -> BoltError {
    match collector.take().outcome {
        Some(Err(e)) => e,
        other => panic!("Expected failure, got {:?}", other),
    }
}

// =============================================================================
// Channel Guard Tests
// =============================================================================

#[test]
fn test_io_error_becomes_service_unavailable() {
    let collector = ResponseCollector::new();
    let mut dispatcher = dispatcher_with(&collector);
    let mut guard = ChannelGuard::new();

    let io_error = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
    let delivered = guard.on_exception(&mut dispatcher, io_error.into());

    assert!(delivered.is_service_unavailable());
    assert!(guard.is_failed());
    assert_eq!(dispatcher.state(), DispatcherState::Fatal);
    assert!(failure_of(&collector).is_service_unavailable());
}

#[test]
fn test_other_errors_pass_through() {
    let collector = ResponseCollector::new();
    let mut dispatcher = dispatcher_with(&collector);
    let mut guard = ChannelGuard::new();

    guard.on_exception(&mut dispatcher, BoltError::Framing("Chunk too large".to_string()));
    assert!(matches!(failure_of(&collector), BoltError::Framing(_)));
}

#[test]
fn test_only_first_fault_reaches_dispatcher() {
    let collector = ResponseCollector::new();
    let mut dispatcher = dispatcher_with(&collector);
    let mut guard = ChannelGuard::new();

    guard.on_exception(&mut dispatcher, BoltError::Protocol("first".to_string()));
    guard.on_exception(&mut dispatcher, BoltError::Protocol("second".to_string()));
    guard.on_inactive(&mut dispatcher, Some("closed"));

    assert!(matches!(dispatcher.fatal_error(), Some(BoltError::Protocol(m)) if m == "first"));
    assert!(dispatcher.suppressed_errors().is_empty());
}

#[test]
fn test_inactive_synthesizes_termination_error() {
    let collector = ResponseCollector::new();
    let mut dispatcher = dispatcher_with(&collector);
    let mut guard = ChannelGuard::new();

    guard.on_inactive(&mut dispatcher, Some("Peer closed the socket."));
    match failure_of(&collector) {
        BoltError::ServiceUnavailable(message) => {
            assert!(message.starts_with("Connection to the database terminated."));
            assert!(message.ends_with("Peer closed the socket."));
        }
        other => panic!("Expected service unavailable, got {:?}", other),
    }
}

// =============================================================================
// Connect Timeout Tests
// =============================================================================

#[test]
fn test_connect_timeout_fires_once() {
    let mut guard = ConnectTimeoutGuard::new(Duration::from_millis(250));

    let first = guard.on_io_error(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
    match first {
        BoltError::ServiceUnavailable(message) => {
            assert_eq!(message, "Unable to establish connection in 250ms");
        }
        other => panic!("Expected service unavailable, got {:?}", other),
    }

    let second = guard.on_io_error(io::Error::new(io::ErrorKind::WouldBlock, "timed out"));
    assert!(matches!(second, BoltError::Io(_)));
}

#[test]
fn test_non_timeout_errors_pass_through() {
    let mut guard = ConnectTimeoutGuard::new(Duration::from_millis(250));
    let err = guard.on_io_error(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
    assert!(matches!(err, BoltError::Io(_)));
}

#[test]
fn test_zero_timeout_disables_guard() {
    let mut guard = ConnectTimeoutGuard::new(Duration::ZERO);
    assert!(guard.timeout().is_none());
    let err = guard.on_io_error(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
    assert!(matches!(err, BoltError::Io(_)));
}

#[test]
fn test_arm_and_disarm_socket_timeouts() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let stream = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let mut guard = ConnectTimeoutGuard::new(Duration::from_millis(500));

    guard.arm(&stream).unwrap();
    assert!(guard.is_armed());
    assert_eq!(stream.read_timeout().unwrap(), Some(Duration::from_millis(500)));

    guard.disarm(&stream).unwrap();
    assert!(!guard.is_armed());
    assert_eq!(stream.read_timeout().unwrap(), None);
}
