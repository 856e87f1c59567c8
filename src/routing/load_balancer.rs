//! Load balancer
//!
//! Acquires a connection to a cluster member suitable for an access mode.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::config::{Config, LoadBalancingStrategyKind};
use crate::error::{BoltError, Result};
use crate::network::{ConnectionPool, QueryResult, QueryRunner};
use crate::packstream::Value;
use super::{
    AccessMode, BoltServerAddress, ClusterCompositionProvider, DatabaseContext, DatabaseName,
    LeastConnectedLoadBalancingStrategy, LoadBalancingStrategy, Rediscovery,
    RoundRobinLoadBalancingStrategy, RoutingTable, RoutingTableHandler, RoutingTableRegistry,
};

pub struct LoadBalancer<P: ConnectionPool> {
    pool: Arc<P>,
    registry: RoutingTableRegistry,
    strategy: Box<dyn LoadBalancingStrategy>,
}

impl<P: ConnectionPool + 'static> LoadBalancer<P> {
    /// Load balancer using the strategy named in `config`
    pub fn new(
        initial_router: BoltServerAddress,
        config: &Config,
        pool: Arc<P>,
        provider: Arc<dyn ClusterCompositionProvider>,
    ) -> Self {
        let strategy: Box<dyn LoadBalancingStrategy> = match config.load_balancing_strategy {
            LoadBalancingStrategyKind::RoundRobin => Box::new(RoundRobinLoadBalancingStrategy::new()),
            LoadBalancingStrategyKind::LeastConnected => {
                Box::new(LeastConnectedLoadBalancingStrategy::new(pool.clone()))
            }
        };
        Self::with_strategy(initial_router, config, pool, provider, strategy)
    }

    pub fn with_strategy(
        initial_router: BoltServerAddress,
        config: &Config,
        pool: Arc<P>,
        provider: Arc<dyn ClusterCompositionProvider>,
        strategy: Box<dyn LoadBalancingStrategy>,
    ) -> Self {
        let rediscovery = Arc::new(Rediscovery::new(initial_router, provider));
        Self {
            pool,
            registry: RoutingTableRegistry::new(rediscovery, config.routing_table_purge_delay()),
            strategy,
        }
    }

    /// Connection to a server able to serve `mode` for the context's database
    pub fn acquire(&self, mode: AccessMode, context: &DatabaseContext) -> Result<RoutingConnection<P::Connection>> {
        let handler = self.registry.refresh(context, mode)?;
        let acquired = self.acquire_from(&handler, mode);
        self.registry.purge_aged();
        acquired
    }

    /// Refresh and return a copy of the context's routing table
    pub fn routing_table(&self, mode: AccessMode, context: &DatabaseContext) -> Result<RoutingTable> {
        let handler = self.registry.refresh(context, mode)?;
        Ok(handler.table())
    }

    pub fn registry(&self) -> &RoutingTableRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    pub fn close(&self) {
        self.pool.close();
    }

    /// Try candidates until one connects; each unreachable candidate is
    /// forgotten, so at most one attempt is made per candidate.
    fn acquire_from(
        &self,
        handler: &Arc<RoutingTableHandler>,
        mode: AccessMode,
    ) -> Result<RoutingConnection<P::Connection>> {
        let mut addresses = handler.addresses(mode);
        if addresses.is_empty() {
            return Err(BoltError::SessionExpired(format!(
                "No {} servers known. Known routing table is: {}",
                mode,
                handler.description()
            )));
        }

        let max_attempts = addresses.len();
        for _ in 0..max_attempts {
            let Some(address) = self.select(mode, &addresses) else {
                break;
            };

            match self.pool.acquire(&address) {
                Ok(connection) => {
                    return Ok(RoutingConnection {
                        inner: connection,
                        address,
                        mode,
                        database: handler.database(),
                        handler: handler.clone(),
                    });
                }
                Err(e) if e.is_service_unavailable() => {
                    tracing::warn!("Failed to obtain a connection towards address {}: {}", address, e);
                    handler.forget(&address);
                    addresses = handler.addresses(mode);
                }
                Err(e) => return Err(e),
            }
        }

        Err(BoltError::SessionExpired(format!(
            "Failed to obtain connection towards {} server. Known routing table is: {}",
            mode,
            handler.description()
        )))
    }

    fn select(&self, mode: AccessMode, addresses: &[BoltServerAddress]) -> Option<BoltServerAddress> {
        match mode {
            AccessMode::Read => self.strategy.select_reader(addresses),
            AccessMode::Write => self.strategy.select_writer(addresses),
        }
    }
}

// =============================================================================
// Routing Connection
// =============================================================================

/// Connection that reports routing-relevant failures back to its table
pub struct RoutingConnection<C> {
    inner: C,
    address: BoltServerAddress,
    mode: AccessMode,
    database: DatabaseName,
    handler: Arc<RoutingTableHandler>,
}

impl<C> RoutingConnection<C> {
    pub fn address(&self) -> &BoltServerAddress {
        &self.address
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn database(&self) -> &DatabaseName {
        &self.database
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Update the routing table after `error` and return the error to
    /// surface to the caller.
    ///
    /// Unreachable servers are forgotten entirely; servers refusing writes
    /// are dropped from the writers.
    pub fn on_error(&self, error: BoltError) -> BoltError {
        if error.is_service_unavailable() {
            self.handler.forget(&self.address);
            return BoltError::SessionExpired(format!(
                "Server at {} is no longer available: {}",
                self.address, error
            ));
        }
        if error.is_routing_writer_error() {
            if self.mode == AccessMode::Read {
                return BoltError::Client(
                    "Write queries cannot be performed in READ access mode.".to_string(),
                );
            }
            self.handler.forget_writer(&self.address);
            return BoltError::SessionExpired(format!(
                "Server at {} no longer accepts writes",
                self.address
            ));
        }
        error
    }
}

impl<C> Deref for RoutingConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C> DerefMut for RoutingConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

impl<C: QueryRunner> QueryRunner for RoutingConnection<C> {
    fn run_query(&mut self, query: &str, parameters: BTreeMap<String, Value>) -> Result<QueryResult> {
        let result = self.inner.run_query(query, parameters);
        result.map_err(|e| self.on_error(e))
    }
}
