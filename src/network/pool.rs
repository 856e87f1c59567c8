//! Connection Pool
//!
//! Per-address pools of idle connections.
//!
//! ```text
//! acquire(addr) ─▶ idle queue for addr ──(empty)──▶ BoltConnection::connect
//!                        ▲
//!                        └─── PooledConnection dropped (still open + idle)
//! ```

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{BoltError, Result};
use crate::packstream::Value;
use crate::routing::BoltServerAddress;
use super::connection::{BoltConnection, QueryResult, QueryRunner};
use super::dispatcher::DispatcherState;

/// In-use counts, as needed by load balancing
pub trait PoolMetrics: Send + Sync {
    fn in_use_connections(&self, address: &BoltServerAddress) -> usize;
}

/// Source of connections to a given address
pub trait ConnectionPool: PoolMetrics {
    type Connection: Send;

    /// Fails with service-unavailable when the address cannot be reached
    fn acquire(&self, address: &BoltServerAddress) -> Result<Self::Connection>;

    fn close(&self);
}

struct AddressPool {
    idle: ArrayQueue<BoltConnection>,
    in_use: AtomicUsize,
    closed: Arc<AtomicBool>,
}

impl AddressPool {
    fn release(&self, mut connection: BoltConnection) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
        if connection.is_open() && connection.dispatcher_state() == DispatcherState::Degraded {
            // Failure acknowledged but its RESET reply not yet read
            if let Err(e) = connection.wait_until_idle() {
                tracing::debug!("Failed to reset connection to {}: {}", connection.address(), e);
            }
        }
        if self.closed.load(Ordering::Acquire) || !connection.is_open() || !connection.is_idle() {
            connection.close();
            return;
        }
        if let Err(mut connection) = self.idle.push(connection) {
            tracing::trace!("Idle queue for {} is full, closing connection", connection.address());
            connection.close();
        }
    }
}

/// Pool of blocking TCP connections
pub struct TcpConnectionPool {
    config: Config,
    pools: RwLock<HashMap<BoltServerAddress, Arc<AddressPool>>>,
    closed: Arc<AtomicBool>,
}

impl TcpConnectionPool {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pools: RwLock::new(HashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Idle connections currently held for `address`
    pub fn idle_connections(&self, address: &BoltServerAddress) -> usize {
        self.pools.read().get(address).map_or(0, |pool| pool.idle.len())
    }

    fn pool_for(&self, address: &BoltServerAddress) -> Arc<AddressPool> {
        if let Some(pool) = self.pools.read().get(address) {
            return pool.clone();
        }
        self.pools
            .write()
            .entry(address.clone())
            .or_insert_with(|| {
                Arc::new(AddressPool {
                    idle: ArrayQueue::new(self.config.max_connection_pool_size.max(1)),
                    in_use: AtomicUsize::new(0),
                    closed: self.closed.clone(),
                })
            })
            .clone()
    }
}

impl PoolMetrics for TcpConnectionPool {
    fn in_use_connections(&self, address: &BoltServerAddress) -> usize {
        self.pools
            .read()
            .get(address)
            .map_or(0, |pool| pool.in_use.load(Ordering::Acquire))
    }
}

impl ConnectionPool for TcpConnectionPool {
    type Connection = PooledConnection;

    fn acquire(&self, address: &BoltServerAddress) -> Result<PooledConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BoltError::Client("Connection pool is closed".to_string()));
        }
        let pool = self.pool_for(address);

        let connection = loop {
            match pool.idle.pop() {
                Some(connection) if connection.is_open() => break connection,
                Some(mut stale) => stale.close(),
                None => {
                    tracing::debug!("Opening new connection to {}", address);
                    break BoltConnection::connect(address, &self.config)?;
                }
            }
        };

        pool.in_use.fetch_add(1, Ordering::AcqRel);
        Ok(PooledConnection {
            connection: Some(connection),
            pool,
        })
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let pools = std::mem::take(&mut *self.pools.write());
        for (address, pool) in pools {
            let mut closed = 0;
            while let Some(mut connection) = pool.idle.pop() {
                connection.close();
                closed += 1;
            }
            tracing::debug!("Closed {} idle connections to {}", closed, address);
        }
    }
}

impl Drop for TcpConnectionPool {
    fn drop(&mut self) {
        ConnectionPool::close(self);
    }
}

/// Connection on loan from a [`TcpConnectionPool`]; returned on drop
pub struct PooledConnection {
    connection: Option<BoltConnection>,
    pool: Arc<AddressPool>,
}

impl Deref for PooledConnection {
    type Target = BoltConnection;

    fn deref(&self) -> &BoltConnection {
        // Only taken in drop
        self.connection.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut BoltConnection {
        self.connection.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl QueryRunner for PooledConnection {
    fn run_query(&mut self, query: &str, parameters: std::collections::BTreeMap<String, Value>) -> Result<QueryResult> {
        self.deref_mut().run_query(query, parameters)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}
