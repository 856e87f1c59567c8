//! Protocol Module
//!
//! Defines the request/response messages exchanged over a chunked channel.
//!
//! ## Connection Setup
//! ```text
//! client                                server
//!   │── magic + 4 proposed versions ──────▶│
//!   │◀──────────────── agreed version ─────│
//!   │── INIT (user_agent, auth) ──────────▶│
//!   │◀──────────────── SUCCESS / FAILURE ──│
//! ```
//!
//! ### Requests
//! - 0x01: INIT        - user_agent, auth_token
//! - 0x10: RUN         - query, parameters
//! - 0x2F: DISCARD_ALL
//! - 0x3F: PULL_ALL
//! - 0x0F: RESET
//!
//! ### Responses
//! - 0x70: SUCCESS     - metadata
//! - 0x71: RECORD      - fields
//! - 0x7E: IGNORED
//! - 0x7F: FAILURE     - code, message
//!
//! Every request is answered by zero or more RECORDs followed by exactly one
//! SUCCESS, FAILURE or IGNORED, in the order the requests were written.

mod request;
mod response;
mod codec;
pub mod handshake;

pub use request::{Request, RequestType};
pub use response::{Response, ResponseType};
pub use codec::MessageCodec;
pub use handshake::{encode_handshake, parse_handshake_response, BOLT_MAGIC, PROPOSED_VERSIONS};
