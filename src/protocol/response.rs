//! Response definitions
//!
//! Represents messages received from the server.

use std::collections::BTreeMap;

use crate::packstream::Value;

/// Response message signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseType {
    Success = 0x70,
    Record = 0x71,
    Ignored = 0x7E,
    Failure = 0x7F,
}

impl ResponseType {
    pub fn from_signature(signature: u8) -> Option<Self> {
        match signature {
            0x70 => Some(ResponseType::Success),
            0x71 => Some(ResponseType::Record),
            0x7E => Some(ResponseType::Ignored),
            0x7F => Some(ResponseType::Failure),
            _ => None,
        }
    }

    /// Number of fields in the message structure
    pub fn arity(self) -> usize {
        match self {
            ResponseType::Ignored => 0,
            _ => 1,
        }
    }
}

/// A response message
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Request completed; carries summary metadata
    Success { metadata: BTreeMap<String, Value> },

    /// One result record; the request is still in flight
    Record { fields: Vec<Value> },

    /// Request skipped because the connection is in a failed state
    Ignored,

    /// Request failed
    Failure { code: String, message: String },
}

impl Response {
    pub fn response_type(&self) -> ResponseType {
        match self {
            Response::Success { .. } => ResponseType::Success,
            Response::Record { .. } => ResponseType::Record,
            Response::Ignored => ResponseType::Ignored,
            Response::Failure { .. } => ResponseType::Failure,
        }
    }

    /// Create a SUCCESS with the given metadata entries
    pub fn success<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Response::Success {
            metadata: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn record(fields: Vec<Value>) -> Self {
        Response::Record { fields }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Failure {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether this message completes the request at the head of the queue
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Response::Record { .. })
    }
}
