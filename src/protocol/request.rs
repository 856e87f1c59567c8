//! Request definitions
//!
//! Represents messages sent to the server.

use std::collections::BTreeMap;

use crate::config::AuthToken;
use crate::packstream::Value;

/// Request message signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    Init = 0x01,
    Reset = 0x0F,
    Run = 0x10,
    DiscardAll = 0x2F,
    PullAll = 0x3F,
}

impl RequestType {
    pub fn from_signature(signature: u8) -> Option<Self> {
        match signature {
            0x01 => Some(RequestType::Init),
            0x0F => Some(RequestType::Reset),
            0x10 => Some(RequestType::Run),
            0x2F => Some(RequestType::DiscardAll),
            0x3F => Some(RequestType::PullAll),
            _ => None,
        }
    }

    /// Number of fields in the message structure
    pub fn arity(self) -> usize {
        match self {
            RequestType::Init | RequestType::Run => 2,
            RequestType::Reset | RequestType::DiscardAll | RequestType::PullAll => 0,
        }
    }
}

/// A request message
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Authenticate and identify the client
    Init {
        user_agent: String,
        auth_token: BTreeMap<String, Value>,
    },

    /// Run a query
    Run {
        query: String,
        parameters: BTreeMap<String, Value>,
    },

    /// Discard all remaining records of the last result
    DiscardAll,

    /// Stream all remaining records of the last result
    PullAll,

    /// Acknowledge a failure and return the connection to a clean state
    Reset,
}

impl Request {
    /// Get the request type
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::Init { .. } => RequestType::Init,
            Request::Run { .. } => RequestType::Run,
            Request::DiscardAll => RequestType::DiscardAll,
            Request::PullAll => RequestType::PullAll,
            Request::Reset => RequestType::Reset,
        }
    }

    pub fn init(user_agent: impl Into<String>, auth: &AuthToken) -> Self {
        let mut auth_token = BTreeMap::new();
        match auth {
            AuthToken::None => {
                auth_token.insert("scheme".to_string(), Value::from("none"));
            }
            AuthToken::Basic { principal, credentials } => {
                auth_token.insert("scheme".to_string(), Value::from("basic"));
                auth_token.insert("principal".to_string(), Value::from(principal.as_str()));
                auth_token.insert("credentials".to_string(), Value::from(credentials.as_str()));
            }
        }
        Request::Init {
            user_agent: user_agent.into(),
            auth_token,
        }
    }

    pub fn run(query: impl Into<String>, parameters: BTreeMap<String, Value>) -> Self {
        Request::Run {
            query: query.into(),
            parameters,
        }
    }
}
