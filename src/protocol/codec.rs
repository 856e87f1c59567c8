//! Protocol codec
//!
//! Encoding and decoding functions for request and response messages.
//!
//! ## Message Format
//! ```text
//! ┌──────────────┬───────────────┬─────────────────────────────┐
//! │ 0xB0|N (1)   │ Signature (1) │   N fields (PackStream)     │
//! └──────────────┴───────────────┴─────────────────────────────┘
//! ```
//!
//! ### Fields by Message
//! - INIT:        user_agent (String), auth_token (Map)
//! - RUN:         query (String), parameters (Map)
//! - DISCARD_ALL / PULL_ALL / RESET: none
//! - SUCCESS:     metadata (Map)
//! - RECORD:      fields (List)
//! - IGNORED:     none
//! - FAILURE:     metadata (Map with `code` and `message`)

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

use crate::error::{BoltError, Result};
use crate::packstream::{Packer, Unpacker, Value, ValueCodec};
use super::{Request, RequestType, Response, ResponseType};

/// Message codec for one negotiated protocol version
#[derive(Debug, Clone)]
pub struct MessageCodec {
    values: ValueCodec,
}

impl MessageCodec {
    pub fn new(version: u32) -> Result<Self> {
        Ok(Self {
            values: ValueCodec::for_version(version)?,
        })
    }

    pub fn version(&self) -> u32 {
        self.values.version()
    }

    pub fn values(&self) -> &ValueCodec {
        &self.values
    }

    // =========================================================================
    // Request Encoding/Decoding
    // =========================================================================

    /// Encode a request to an unchunked message body
    pub fn encode_request(&self, request: &Request) -> Result<Bytes> {
        let mut out = BytesMut::new();
        let mut packer = Packer::new(&mut out);
        let request_type = request.request_type();
        packer.pack_struct_header(request_type.arity(), request_type as u8)?;

        match request {
            Request::Init { user_agent, auth_token } => {
                packer.pack_string(user_agent)?;
                self.pack_map(auth_token, &mut packer)?;
            }
            Request::Run { query, parameters } => {
                packer.pack_string(query)?;
                self.pack_map(parameters, &mut packer)?;
            }
            Request::DiscardAll | Request::PullAll | Request::Reset => {}
        }

        Ok(out.freeze())
    }

    /// Decode a request message body
    pub fn decode_request(&self, bytes: Bytes) -> Result<Request> {
        let mut unpacker = Unpacker::new(bytes);
        let (size, signature) = unpacker.unpack_struct_header()?;
        let request_type = RequestType::from_signature(signature).ok_or_else(|| {
            BoltError::Protocol(format!("Unknown request signature: 0x{:02x}", signature))
        })?;
        check_arity(&format!("{:?}", request_type), request_type.arity(), size)?;

        let request = match request_type {
            RequestType::Init => Request::Init {
                user_agent: unpacker.unpack_string()?,
                auth_token: self.unpack_map(&mut unpacker)?,
            },
            RequestType::Run => Request::Run {
                query: unpacker.unpack_string()?,
                parameters: self.unpack_map(&mut unpacker)?,
            },
            RequestType::DiscardAll => Request::DiscardAll,
            RequestType::PullAll => Request::PullAll,
            RequestType::Reset => Request::Reset,
        };

        ensure_consumed(&unpacker)?;
        Ok(request)
    }

    // =========================================================================
    // Response Encoding/Decoding
    // =========================================================================

    /// Encode a response to an unchunked message body
    pub fn encode_response(&self, response: &Response) -> Result<Bytes> {
        let mut out = BytesMut::new();
        let mut packer = Packer::new(&mut out);
        let response_type = response.response_type();
        packer.pack_struct_header(response_type.arity(), response_type as u8)?;

        match response {
            Response::Success { metadata } => self.pack_map(metadata, &mut packer)?,
            Response::Record { fields } => {
                packer.pack_list_header(fields.len())?;
                for field in fields {
                    self.values.pack(field, &mut packer)?;
                }
            }
            Response::Ignored => {}
            Response::Failure { code, message } => {
                packer.pack_map_header(2)?;
                packer.pack_string("code")?;
                packer.pack_string(code)?;
                packer.pack_string("message")?;
                packer.pack_string(message)?;
            }
        }

        Ok(out.freeze())
    }

    /// Decode a response message body
    pub fn decode_response(&self, bytes: Bytes) -> Result<Response> {
        let mut unpacker = Unpacker::new(bytes);
        let (size, signature) = unpacker.unpack_struct_header()?;
        let response_type = ResponseType::from_signature(signature).ok_or_else(|| {
            BoltError::Protocol(format!("Unknown response signature: 0x{:02x}", signature))
        })?;
        check_arity(&format!("{:?}", response_type), response_type.arity(), size)?;

        let response = match response_type {
            ResponseType::Success => Response::Success {
                metadata: self.unpack_map(&mut unpacker)?,
            },
            ResponseType::Record => {
                let count = unpacker.unpack_list_header()?;
                let fields = (0..count)
                    .map(|_| self.values.unpack(&mut unpacker))
                    .collect::<Result<Vec<_>>>()?;
                Response::Record { fields }
            }
            ResponseType::Ignored => Response::Ignored,
            ResponseType::Failure => {
                let metadata = self.unpack_map(&mut unpacker)?;
                let field = |name: &str| {
                    metadata
                        .get(name)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_default()
                };
                Response::Failure {
                    code: field("code"),
                    message: field("message"),
                }
            }
        };

        ensure_consumed(&unpacker)?;
        Ok(response)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn pack_map(&self, map: &BTreeMap<String, Value>, packer: &mut Packer<'_>) -> Result<()> {
        packer.pack_map_header(map.len())?;
        for (key, value) in map {
            packer.pack_string(key)?;
            self.values.pack(value, packer)?;
        }
        Ok(())
    }

    fn unpack_map(&self, unpacker: &mut Unpacker) -> Result<BTreeMap<String, Value>> {
        match self.values.unpack(unpacker)? {
            Value::Map(map) => Ok(map),
            other => Err(BoltError::Protocol(format!(
                "Expected Map but got {}",
                other.type_name()
            ))),
        }
    }
}

fn check_arity(name: &str, expected: usize, declared: usize) -> Result<()> {
    if expected != declared {
        return Err(BoltError::Protocol(format!(
            "Invalid message received, {} messages should have {} fields, received {} fields",
            name, expected, declared
        )));
    }
    Ok(())
}

fn ensure_consumed(unpacker: &Unpacker) -> Result<()> {
    if unpacker.has_remaining() {
        return Err(BoltError::Protocol(format!(
            "{} trailing bytes after message",
            unpacker.remaining()
        )));
    }
    Ok(())
}
