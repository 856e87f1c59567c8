//! # boltlink
//!
//! Transport core for a Bolt-style graph database client:
//! - Chunked message framing with pluggable cumulation
//! - Versioned PackStream value codec (temporal and spatial types in v2)
//! - FIFO response dispatch with RESET-based failure recovery
//! - Cluster routing with rediscovery and load-balanced connection acquisition
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     LoadBalancer                             │
//! │        (routing table registry + selection strategy)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ acquire(address)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Connection Pool                            │
//! │              (idle queue per address)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │   Chunking  │          │  Dispatcher  │
//!   │ (framing)   │          │ (FIFO queue) │
//!   └──────┬──────┘          └──────▲───────┘
//!          │                        │
//!          ▼                        │
//!   ┌─────────────┐          ┌──────┴───────┐
//!   │ PackStream  │ ───────▶ │   Protocol   │
//!   │  (values)   │          │  (messages)  │
//!   └─────────────┘          └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod chunking;
pub mod packstream;
pub mod protocol;
pub mod network;
pub mod routing;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BoltError, ErrorClassification, Result};
pub use config::Config;
pub use network::{BoltConnection, TcpConnectionPool};
pub use routing::{AccessMode, BoltServerAddress, DatabaseContext, DatabaseName, LoadBalancer};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of boltlink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
