//! Routing table
//!
//! Routers, readers and writers of one database with an expiry instant.

use std::fmt;
use std::time::{Duration, Instant};

use super::{AccessMode, BoltServerAddress, ClusterComposition, DatabaseName};

#[derive(Debug, Clone)]
pub struct RoutingTable {
    database: DatabaseName,
    routers: Vec<BoltServerAddress>,
    readers: Vec<BoltServerAddress>,
    writers: Vec<BoltServerAddress>,
    expires_at: Instant,
    prefer_initial_router: bool,
}

impl RoutingTable {
    /// A table that knows only the initial router and is already expired
    pub fn new(database: DatabaseName, initial_router: BoltServerAddress) -> Self {
        Self {
            database,
            routers: vec![initial_router],
            readers: Vec::new(),
            writers: Vec::new(),
            expires_at: Instant::now(),
            prefer_initial_router: true,
        }
    }

    /// Expired, without routers, or without servers for `mode`
    pub fn is_stale_for(&self, mode: AccessMode) -> bool {
        Instant::now() >= self.expires_at
            || self.routers.is_empty()
            || match mode {
                AccessMode::Read => self.readers.is_empty(),
                AccessMode::Write => self.writers.is_empty(),
            }
    }

    /// Expired for at least `delay`
    pub fn has_been_stale_for(&self, delay: Duration) -> bool {
        match self.expires_at.checked_add(delay) {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Replace every role and restart the expiry clock
    pub fn update(&mut self, composition: ClusterComposition) {
        self.expires_at = Instant::now()
            .checked_add(composition.ttl)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(u32::MAX as u64));
        self.prefer_initial_router = !composition.has_writers();
        self.routers = composition.routers;
        self.readers = composition.readers;
        self.writers = composition.writers;
    }

    /// Stop using `address` for reads and writes; routers are kept
    pub fn forget(&mut self, address: &BoltServerAddress) {
        self.readers.retain(|a| a != address);
        self.writers.retain(|a| a != address);
    }

    pub fn forget_writer(&mut self, address: &BoltServerAddress) {
        self.writers.retain(|a| a != address);
    }

    pub fn addresses(&self, mode: AccessMode) -> &[BoltServerAddress] {
        match mode {
            AccessMode::Read => &self.readers,
            AccessMode::Write => &self.writers,
        }
    }

    pub fn routers(&self) -> &[BoltServerAddress] {
        &self.routers
    }

    pub fn readers(&self) -> &[BoltServerAddress] {
        &self.readers
    }

    pub fn writers(&self) -> &[BoltServerAddress] {
        &self.writers
    }

    pub fn database(&self) -> &DatabaseName {
        &self.database
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the initial router should be asked before known routers
    pub fn prefer_initial_router(&self) -> bool {
        self.prefer_initial_router
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now = Instant::now();
        let ttl = self.expires_at.saturating_duration_since(now);
        write!(
            f,
            "RoutingTable[database={}, expiresIn={}ms, routers={}, writers={}, readers={}]",
            self.database,
            ttl.as_millis(),
            list(&self.routers),
            list(&self.writers),
            list(&self.readers)
        )
    }
}

fn list(addresses: &[BoltServerAddress]) -> String {
    let joined = addresses
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", joined)
}
