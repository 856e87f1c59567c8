//! Routing Module
//!
//! Cluster-aware connection acquisition.
//!
//! ## Acquire Path
//! ```text
//! ┌──────────────┐  refresh   ┌──────────────────────┐  lookup  ┌─────────────┐
//! │ LoadBalancer │ ─────────▶ │ RoutingTableRegistry │ ───────▶ │ Rediscovery │
//! └──────┬───────┘            └──────────────────────┘          └──────┬──────┘
//!        │ select (strategy)                                           │ routing procedure
//!        ▼                                                             ▼
//! ┌──────────────┐  acquire   ┌──────────────┐              ┌────────────────────┐
//! │   address    │ ─────────▶ │     pool     │              │ ClusterComposition │
//! └──────────────┘            └──────────────┘              └────────────────────┘
//! ```
//!
//! An address that turns out unreachable is forgotten from the table and the
//! next candidate is tried, at most once per candidate.

mod address;
mod composition;
mod table;
mod strategy;
mod rediscovery;
mod registry;
mod load_balancer;

use std::fmt;

pub use address::{BoltServerAddress, DEFAULT_PORT};
pub use composition::ClusterComposition;
pub use table::RoutingTable;
pub use strategy::{
    LeastConnectedLoadBalancingStrategy, LoadBalancingStrategy, RoundRobinArrayIndex,
    RoundRobinLoadBalancingStrategy,
};
pub use rediscovery::{
    ClusterCompositionProvider, Rediscovery, RoutingProcedureRunner, GET_ROUTING_TABLE,
    GET_ROUTING_TABLE_FOR_DATABASE,
};
pub use registry::{RoutingTableHandler, RoutingTableRegistry};
pub use load_balancer::{LoadBalancer, RoutingConnection};

/// Which cluster role a connection is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => f.write_str("READ"),
            AccessMode::Write => f.write_str("WRITE"),
        }
    }
}

/// Database a routing table belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DatabaseName {
    /// Whatever the server considers its default database
    #[default]
    Default,
    Named(String),
}

impl DatabaseName {
    pub fn named(name: impl Into<String>) -> Self {
        DatabaseName::Named(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            DatabaseName::Default => None,
            DatabaseName::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseName::Default => f.write_str("<default database>"),
            DatabaseName::Named(name) => f.write_str(name),
        }
    }
}

/// Database plus the causal bookmarks a request must observe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseContext {
    pub database: DatabaseName,
    pub bookmarks: Vec<String>,
}

impl DatabaseContext {
    pub fn new(database: DatabaseName) -> Self {
        Self {
            database,
            bookmarks: Vec::new(),
        }
    }

    pub fn with_bookmarks(mut self, bookmarks: Vec<String>) -> Self {
        self.bookmarks = bookmarks;
        self
    }
}
