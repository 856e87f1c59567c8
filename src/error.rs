//! Error types for boltlink
//!
//! Provides a unified, cloneable error type for all operations. A single
//! connection fault is delivered to every request queued on that connection,
//! so the error must be `Clone`; I/O errors are therefore shared via `Arc`.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias using BoltError
pub type Result<T> = std::result::Result<T, BoltError>;

/// Server status code for a write attempted against a follower
pub const NOT_A_LEADER: &str = "Neo.ClientError.Cluster.NotALeader";

/// Server status code for a write attempted against a read-only database
pub const FORBIDDEN_ON_READ_ONLY_DATABASE: &str =
    "Neo.ClientError.General.ForbiddenOnReadOnlyDatabase";

/// Server status code returned when the routing procedure does not exist
pub const PROCEDURE_NOT_FOUND: &str = "Neo.ClientError.Procedure.ProcedureNotFound";

/// Unified error type for boltlink operations
#[derive(Debug, Clone, Error)]
pub enum BoltError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    // -------------------------------------------------------------------------
    // Wire Errors (never retried)
    // -------------------------------------------------------------------------
    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Server Failures
    // -------------------------------------------------------------------------
    #[error("{code}: {message}")]
    Server {
        code: String,
        message: String,
        classification: ErrorClassification,
    },

    #[error("Request ignored: the database ignored the request")]
    RequestIgnored,

    // -------------------------------------------------------------------------
    // Cluster Errors
    // -------------------------------------------------------------------------
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    // -------------------------------------------------------------------------
    // Client-side Errors
    // -------------------------------------------------------------------------
    #[error("Client error: {0}")]
    Client(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for BoltError {
    fn from(err: std::io::Error) -> Self {
        BoltError::Io(Arc::new(err))
    }
}

impl BoltError {
    /// Build a typed error from a server FAILURE message
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let classification = ErrorClassification::from_code(&code);
        BoltError::Server {
            code,
            message: message.into(),
            classification,
        }
    }

    /// Whether this error makes the connection it occurred on unusable.
    ///
    /// Only server failures can be recoverable; every other variant reaching
    /// a dispatcher is a channel-level fault.
    pub fn is_fatal(&self) -> bool {
        match self {
            BoltError::Server { classification, .. } => classification.is_fatal(),
            _ => true,
        }
    }

    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, BoltError::ServiceUnavailable(_))
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, BoltError::SessionExpired(_))
    }

    /// Server status code, if this is a server failure
    pub fn code(&self) -> Option<&str> {
        match self {
            BoltError::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<ErrorClassification> {
        match self {
            BoltError::Server { classification, .. } => Some(*classification),
            _ => None,
        }
    }

    /// Whether the server refused a write because it is not (or no longer)
    /// a writer for the database
    pub fn is_routing_writer_error(&self) -> bool {
        matches!(self.code(), Some(NOT_A_LEADER) | Some(FORBIDDEN_ON_READ_ONLY_DATABASE))
    }
}

/// Classification of a server status code `Neo.<Classification>.<Category>.<Title>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// Caller mistake; the connection stays usable after RESET
    Client,

    /// Temporary server condition; the connection stays usable after RESET
    Transient,

    /// Authentication or authorization failure
    Security,

    /// Malformed request; client and server disagree on the protocol
    ProtocolViolation,

    /// Server ran out of memory or stack while serving the request
    ResourceExhaustion,

    /// Internal database failure
    Database,

    /// Code did not follow the `Neo.<Classification>.<Category>.<Title>` form
    Unclassified,
}

const RESOURCE_EXHAUSTION_TITLES: &[&str] = &[
    "OutOfMemoryError",
    "StackOverFlowError",
    "MemoryPoolOutOfMemoryError",
    "TransactionMemoryLimit",
];

impl ErrorClassification {
    pub fn from_code(code: &str) -> Self {
        let parts: Vec<&str> = code.split('.').collect();
        if parts.len() != 4 || parts[0] != "Neo" {
            return ErrorClassification::Unclassified;
        }
        let (classification, category, title) = (parts[1], parts[2], parts[3]);

        if RESOURCE_EXHAUSTION_TITLES.contains(&title) {
            return ErrorClassification::ResourceExhaustion;
        }

        match (classification, category) {
            ("ClientError", "Security") => ErrorClassification::Security,
            ("ClientError", "Request") => ErrorClassification::ProtocolViolation,
            ("ClientError", _) => ErrorClassification::Client,
            ("TransientError", _) => ErrorClassification::Transient,
            ("DatabaseError", _) => ErrorClassification::Database,
            _ => ErrorClassification::Unclassified,
        }
    }

    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorClassification::Client | ErrorClassification::Transient)
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClassification::Client => "client",
            ErrorClassification::Transient => "transient",
            ErrorClassification::Security => "security",
            ErrorClassification::ProtocolViolation => "protocol violation",
            ErrorClassification::ResourceExhaustion => "resource exhaustion",
            ErrorClassification::Database => "database",
            ErrorClassification::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}
