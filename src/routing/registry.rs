//! Routing table registry
//!
//! One routing table per database, refreshed on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use super::{AccessMode, BoltServerAddress, DatabaseContext, DatabaseName, Rediscovery, RoutingTable};

/// Owns the routing table of one database
pub struct RoutingTableHandler {
    table: RwLock<RoutingTable>,

    /// Serializes rediscovery; readers of the table never wait on it
    refresh_lock: Mutex<()>,
    rediscovery: Arc<Rediscovery>,
}

impl RoutingTableHandler {
    pub fn new(database: DatabaseName, rediscovery: Arc<Rediscovery>) -> Self {
        let table = RoutingTable::new(database, rediscovery.initial_router().clone());
        Self {
            table: RwLock::new(table),
            refresh_lock: Mutex::new(()),
            rediscovery,
        }
    }

    /// Make sure the table is usable for `mode`, running rediscovery if not
    pub fn refresh(&self, mode: AccessMode, context: &DatabaseContext) -> Result<()> {
        if !self.table.read().is_stale_for(mode) {
            return Ok(());
        }

        let _refreshing = self.refresh_lock.lock();
        let snapshot = {
            let table = self.table.read();
            if !table.is_stale_for(mode) {
                return Ok(());
            }
            table.clone()
        };

        tracing::debug!("Routing table is stale for {}. {}", mode, snapshot);
        let composition = self.rediscovery.lookup(&snapshot, context)?;

        let mut table = self.table.write();
        table.update(composition);
        tracing::debug!("Updated routing table. {}", table);
        Ok(())
    }

    pub fn forget(&self, address: &BoltServerAddress) {
        tracing::debug!("Forgetting {} for database '{}'", address, self.table.read().database());
        self.table.write().forget(address);
    }

    pub fn forget_writer(&self, address: &BoltServerAddress) {
        tracing::debug!("Forgetting writer {} for database '{}'", address, self.table.read().database());
        self.table.write().forget_writer(address);
    }

    pub fn addresses(&self, mode: AccessMode) -> Vec<BoltServerAddress> {
        self.table.read().addresses(mode).to_vec()
    }

    /// Copy of the current table
    pub fn table(&self) -> RoutingTable {
        self.table.read().clone()
    }

    pub fn database(&self) -> DatabaseName {
        self.table.read().database().clone()
    }

    pub fn description(&self) -> String {
        self.table.read().to_string()
    }

    fn has_been_stale_for(&self, delay: Duration) -> bool {
        self.table.read().has_been_stale_for(delay)
    }
}

/// Routing tables of every database in use
pub struct RoutingTableRegistry {
    handlers: Mutex<HashMap<DatabaseName, Arc<RoutingTableHandler>>>,
    rediscovery: Arc<Rediscovery>,
    purge_delay: Duration,
}

impl RoutingTableRegistry {
    pub fn new(rediscovery: Arc<Rediscovery>, purge_delay: Duration) -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            rediscovery,
            purge_delay,
        }
    }

    /// Handler for the context's database with a table usable for `mode`.
    ///
    /// A handler whose refresh fails is dropped from the registry.
    pub fn refresh(&self, context: &DatabaseContext, mode: AccessMode) -> Result<Arc<RoutingTableHandler>> {
        let handler = self.handler_for(&context.database);
        match handler.refresh(mode, context) {
            Ok(()) => Ok(handler),
            Err(e) => {
                self.remove(&context.database);
                Err(e)
            }
        }
    }

    fn handler_for(&self, database: &DatabaseName) -> Arc<RoutingTableHandler> {
        self.handlers
            .lock()
            .entry(database.clone())
            .or_insert_with(|| {
                tracing::debug!("Routing table handler for database '{}' is added", database);
                Arc::new(RoutingTableHandler::new(database.clone(), self.rediscovery.clone()))
            })
            .clone()
    }

    pub fn remove(&self, database: &DatabaseName) {
        if self.handlers.lock().remove(database).is_some() {
            tracing::debug!("Routing table handler for database '{}' is removed", database);
        }
    }

    /// Evict tables expired for longer than the purge delay and not in use
    pub fn purge_aged(&self) {
        self.handlers.lock().retain(|database, handler| {
            let aged = handler.has_been_stale_for(self.purge_delay) && Arc::strong_count(handler) == 1;
            if aged {
                tracing::info!("Routing table handler for database '{}' is removed because it has not been used for a long time", database);
            }
            !aged
        });
    }

    pub fn contains(&self, database: &DatabaseName) -> bool {
        self.handlers.lock().contains_key(database)
    }

    pub fn get(&self, database: &DatabaseName) -> Option<Arc<RoutingTableHandler>> {
        self.handlers.lock().get(database).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
