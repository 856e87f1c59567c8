//! Configuration for boltlink
//!
//! Centralized configuration with sensible defaults.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::chunking::MAX_CHUNK_SIZE;
use crate::error::{BoltError, Result};

/// Main configuration for a client transport instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Connect + handshake timeout (milliseconds). The guard is removed once
    /// the handshake completes.
    pub connection_timeout_ms: u64,

    /// User agent sent in INIT
    pub user_agent: String,

    /// Credentials sent in INIT
    pub auth: AuthToken,

    // -------------------------------------------------------------------------
    // Framing Configuration
    // -------------------------------------------------------------------------
    /// Largest chunk body written (bytes, at most 0xFFFF). Inbound chunks are
    /// limited only by the wire format.
    pub max_chunk_size: usize,

    /// How chunk bodies are collected into a message
    pub cumulation: Cumulation,

    // -------------------------------------------------------------------------
    // Pool Configuration
    // -------------------------------------------------------------------------
    /// Max idle connections kept per address
    pub max_connection_pool_size: usize,

    // -------------------------------------------------------------------------
    // Routing Configuration
    // -------------------------------------------------------------------------
    /// Address selection strategy for readers/writers
    pub load_balancing_strategy: LoadBalancingStrategyKind,

    /// How long an expired routing table is kept before being purged (milliseconds)
    pub routing_table_purge_delay_ms: u64,

    /// Routing context passed to the routing procedure
    pub routing_context: BTreeMap<String, String>,
}

/// Chunk cumulation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cumulation {
    /// Copy every chunk into one growing buffer
    Merge,

    /// Keep chunks as separate buffers, joined only when the message completes
    Composite,
}

/// Load balancing strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalancingStrategyKind {
    RoundRobin,
    LeastConnected,
}

/// Authentication token sent with INIT
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthToken {
    None,
    Basic { principal: String, credentials: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 30_000,
            user_agent: format!("boltlink/{}", crate::VERSION),
            auth: AuthToken::None,
            max_chunk_size: MAX_CHUNK_SIZE,
            cumulation: Cumulation::Merge,
            max_connection_pool_size: 100,
            load_balancing_strategy: LoadBalancingStrategyKind::LeastConnected,
            routing_table_purge_delay_ms: 30_000,
            routing_context: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn routing_table_purge_delay(&self) -> Duration {
        Duration::from_millis(self.routing_table_purge_delay_ms)
    }

    /// Reject settings the transport cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 || self.max_chunk_size > MAX_CHUNK_SIZE {
            return Err(BoltError::Config(format!(
                "max_chunk_size must be between 1 and {}, got {}",
                MAX_CHUNK_SIZE, self.max_chunk_size
            )));
        }
        if self.max_connection_pool_size == 0 {
            return Err(BoltError::Config(
                "max_connection_pool_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the connect + handshake timeout (in milliseconds)
    pub fn connection_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connection_timeout_ms = ms;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Use basic authentication
    pub fn basic_auth(mut self, principal: impl Into<String>, credentials: impl Into<String>) -> Self {
        self.config.auth = AuthToken::Basic {
            principal: principal.into(),
            credentials: credentials.into(),
        };
        self
    }

    /// Set the largest chunk body (in bytes)
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    pub fn cumulation(mut self, cumulation: Cumulation) -> Self {
        self.config.cumulation = cumulation;
        self
    }

    /// Set the maximum number of idle connections per address
    pub fn max_connection_pool_size(mut self, size: usize) -> Self {
        self.config.max_connection_pool_size = size;
        self
    }

    pub fn load_balancing_strategy(mut self, kind: LoadBalancingStrategyKind) -> Self {
        self.config.load_balancing_strategy = kind;
        self
    }

    /// Set the routing table purge delay (in milliseconds)
    pub fn routing_table_purge_delay_ms(mut self, ms: u64) -> Self {
        self.config.routing_table_purge_delay_ms = ms;
        self
    }

    /// Add one routing context entry
    pub fn routing_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.routing_context.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
