//! Version handshake
//!
//! ```text
//! client → server:
//! ┌────────────────┬──────────┬──────────┬──────────┬──────────┐
//! │ 0x6060B017 (4) │ v1 (4)   │ v2 (4)   │ v3 (4)   │ v4 (4)   │
//! └────────────────┴──────────┴──────────┴──────────┴──────────┘
//! server → client:
//! ┌────────────────┐
//! │ agreed (4)     │
//! └────────────────┘
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{BoltError, Result};

/// Preamble identifying the protocol
pub const BOLT_MAGIC: u32 = 0x6060_B017;

/// Versions proposed in order of preference; zero fills unused slots
pub const PROPOSED_VERSIONS: [u32; 4] = [2, 1, 0, 0];

/// Server reply meaning none of the proposals is supported
pub const NO_PROTOCOL_VERSION: u32 = 0;

/// "HTTP" read as a big-endian u32; the port answered with an HTTP response
pub const HTTP: u32 = 0x4854_5450;

pub const HANDSHAKE_SIZE: usize = 20;
pub const HANDSHAKE_RESPONSE_SIZE: usize = 4;

/// Bytes sent immediately after the socket is connected
pub fn encode_handshake() -> BytesMut {
    let mut buf = BytesMut::with_capacity(HANDSHAKE_SIZE);
    buf.put_u32(BOLT_MAGIC);
    for version in PROPOSED_VERSIONS {
        buf.put_u32(version);
    }
    buf
}

/// Interpret the server's four byte reply
pub fn parse_handshake_response(reply: [u8; HANDSHAKE_RESPONSE_SIZE]) -> Result<u32> {
    match u32::from_be_bytes(reply) {
        NO_PROTOCOL_VERSION => Err(BoltError::Client(
            "The server does not support any of the protocol versions supported by this \
             driver. Ensure that you are using driver and server versions that are \
             compatible with one another."
                .to_string(),
        )),
        HTTP => Err(BoltError::Client(
            "Server responded HTTP. Make sure you are not trying to connect to the http \
             endpoint (HTTP defaults to port 7474 whereas BOLT defaults to port 7687)"
                .to_string(),
        )),
        version if PROPOSED_VERSIONS.contains(&version) => Ok(version),
        other => Err(BoltError::Protocol(format!(
            "Server chose protocol version {} which was never proposed",
            other
        ))),
    }
}
