//! Rediscovery
//!
//! Finds a fresh cluster composition by asking routers in turn.
//!
//! ## Router Order
//! ```text
//! prefer initial router?  ── yes ─▶ initial, then known routers
//!                         └─ no ──▶ known routers, then initial (if not tried)
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{BoltError, ErrorClassification, Result, PROCEDURE_NOT_FOUND};
use crate::network::{ConnectionPool, QueryRunner};
use crate::packstream::Value;
use super::{BoltServerAddress, ClusterComposition, DatabaseContext, DatabaseName, RoutingTable};

/// Routing procedure for the default database
pub const GET_ROUTING_TABLE: &str = "CALL dbms.cluster.routing.getRoutingTable($context)";

/// Routing procedure for a named database
pub const GET_ROUTING_TABLE_FOR_DATABASE: &str =
    "CALL dbms.routing.getRoutingTable($context, $database)";

/// Asks one router for the current cluster composition
pub trait ClusterCompositionProvider: Send + Sync {
    fn get_cluster_composition(
        &self,
        router: &BoltServerAddress,
        context: &DatabaseContext,
    ) -> Result<ClusterComposition>;
}

pub struct Rediscovery {
    initial_router: BoltServerAddress,
    provider: Arc<dyn ClusterCompositionProvider>,
}

impl Rediscovery {
    pub fn new(initial_router: BoltServerAddress, provider: Arc<dyn ClusterCompositionProvider>) -> Self {
        Self {
            initial_router,
            provider,
        }
    }

    pub fn initial_router(&self) -> &BoltServerAddress {
        &self.initial_router
    }

    /// Fetch a composition for the table's database.
    ///
    /// Routers failing with a recoverable error are skipped; security,
    /// protocol and client errors end the lookup.
    pub fn lookup(&self, table: &RoutingTable, context: &DatabaseContext) -> Result<ClusterComposition> {
        let mut tried = HashSet::new();

        if table.prefer_initial_router() {
            if let Some(composition) = self.try_router(&self.initial_router, context, &mut tried)? {
                return Ok(composition);
            }
        }

        for router in table.routers() {
            if let Some(composition) = self.try_router(router, context, &mut tried)? {
                return Ok(composition);
            }
        }

        if let Some(composition) = self.try_router(&self.initial_router, context, &mut tried)? {
            return Ok(composition);
        }

        Err(BoltError::ServiceUnavailable(format!(
            "Could not perform discovery for database '{}'. No routing server available.",
            table.database()
        )))
    }

    /// `Ok(None)` when the router was already tried or failed recoverably
    fn try_router(
        &self,
        router: &BoltServerAddress,
        context: &DatabaseContext,
        tried: &mut HashSet<BoltServerAddress>,
    ) -> Result<Option<ClusterComposition>> {
        if !tried.insert(router.clone()) {
            return Ok(None);
        }

        match self.provider.get_cluster_composition(router, context) {
            Ok(composition) => {
                tracing::debug!("Received routing table from {}", router);
                Ok(Some(composition))
            }
            Err(e) if is_fatal_discovery_error(&e) => Err(e),
            Err(e) => {
                tracing::warn!("Failed to update routing table with server '{}': {}", router, e);
                Ok(None)
            }
        }
    }
}

fn is_fatal_discovery_error(error: &BoltError) -> bool {
    match error {
        BoltError::Protocol(_) | BoltError::Framing(_) | BoltError::Client(_) | BoltError::Config(_) => true,
        BoltError::Server { classification, .. } => matches!(
            classification,
            ErrorClassification::Security | ErrorClassification::ProtocolViolation | ErrorClassification::Client
        ),
        _ => false,
    }
}

// =============================================================================
// Routing Procedure
// =============================================================================

/// Runs the routing procedure over pooled connections
pub struct RoutingProcedureRunner<P: ConnectionPool> {
    pool: Arc<P>,
    routing_context: BTreeMap<String, String>,
}

impl<P: ConnectionPool> RoutingProcedureRunner<P> {
    pub fn new(pool: Arc<P>, routing_context: BTreeMap<String, String>) -> Self {
        Self {
            pool,
            routing_context,
        }
    }

    /// Query text and parameters for `database`
    pub fn procedure(&self, database: &DatabaseName) -> (&'static str, BTreeMap<String, Value>) {
        let context = self
            .routing_context
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect::<BTreeMap<_, _>>();

        let mut parameters = BTreeMap::new();
        parameters.insert("context".to_string(), Value::Map(context));
        match database {
            DatabaseName::Default => (GET_ROUTING_TABLE, parameters),
            DatabaseName::Named(name) => {
                parameters.insert("database".to_string(), Value::from(name.as_str()));
                (GET_ROUTING_TABLE_FOR_DATABASE, parameters)
            }
        }
    }
}

impl<P> ClusterCompositionProvider for RoutingProcedureRunner<P>
where
    P: ConnectionPool + 'static,
    P::Connection: QueryRunner,
{
    fn get_cluster_composition(
        &self,
        router: &BoltServerAddress,
        context: &DatabaseContext,
    ) -> Result<ClusterComposition> {
        let (query, parameters) = self.procedure(&context.database);
        tracing::debug!(
            "Fetching routing table for database '{}' from {} (bookmarks: {:?})",
            context.database,
            router,
            context.bookmarks
        );

        let mut connection = self.pool.acquire(router)?;
        let result = connection.run_query(query, parameters).map_err(|e| {
            if e.code() == Some(PROCEDURE_NOT_FOUND) {
                BoltError::ServiceUnavailable(format!(
                    "Server {} couldn't perform routing. Make sure you are connecting to a causal cluster: {}",
                    router, e
                ))
            } else {
                e
            }
        })?;

        ClusterComposition::parse(&result)
    }
}
