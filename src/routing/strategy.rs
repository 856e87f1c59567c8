//! Load balancing strategies
//!
//! Pick one address out of the readers or writers of a routing table.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::network::PoolMetrics;
use super::BoltServerAddress;

pub trait LoadBalancingStrategy: Send + Sync {
    fn select_reader(&self, known_readers: &[BoltServerAddress]) -> Option<BoltServerAddress>;

    fn select_writer(&self, known_writers: &[BoltServerAddress]) -> Option<BoltServerAddress>;
}

/// Shared cyclic counter; wraps back to zero instead of overflowing
#[derive(Debug, Default)]
pub struct RoundRobinArrayIndex {
    offset: AtomicUsize,
}

impl RoundRobinArrayIndex {
    pub fn new(initial_offset: usize) -> Self {
        Self {
            offset: AtomicUsize::new(initial_offset),
        }
    }

    /// Next index into an array of `len` elements, `None` when empty
    pub fn next(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let mut current = self.offset.load(Ordering::Relaxed);
        loop {
            let next = current.checked_add(1).unwrap_or(0);
            match self
                .offset
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Some(current % len),
                Err(actual) => current = actual,
            }
        }
    }
}

// =============================================================================
// Round Robin
// =============================================================================

#[derive(Debug, Default)]
pub struct RoundRobinLoadBalancingStrategy {
    readers_index: RoundRobinArrayIndex,
    writers_index: RoundRobinArrayIndex,
}

impl RoundRobinLoadBalancingStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategy whose reader and writer indexes start at the given offsets
    pub fn with_offsets(readers_offset: usize, writers_offset: usize) -> Self {
        Self {
            readers_index: RoundRobinArrayIndex::new(readers_offset),
            writers_index: RoundRobinArrayIndex::new(writers_offset),
        }
    }

    fn select(
        addresses: &[BoltServerAddress],
        index: &RoundRobinArrayIndex,
        role: &str,
    ) -> Option<BoltServerAddress> {
        let selected = index.next(addresses.len()).map(|i| addresses[i].clone());
        if selected.is_none() {
            tracing::warn!("Unable to select {}, no known addresses given", role);
        }
        selected
    }
}

impl LoadBalancingStrategy for RoundRobinLoadBalancingStrategy {
    fn select_reader(&self, known_readers: &[BoltServerAddress]) -> Option<BoltServerAddress> {
        Self::select(known_readers, &self.readers_index, "reader")
    }

    fn select_writer(&self, known_writers: &[BoltServerAddress]) -> Option<BoltServerAddress> {
        Self::select(known_writers, &self.writers_index, "writer")
    }
}

// =============================================================================
// Least Connected
// =============================================================================

/// Picks the address with the fewest in-use connections.
///
/// The scan starts at a rotating offset so that ties are spread across
/// addresses; among equals the first one scanned wins.
pub struct LeastConnectedLoadBalancingStrategy {
    readers_index: RoundRobinArrayIndex,
    writers_index: RoundRobinArrayIndex,
    metrics: Arc<dyn PoolMetrics>,
}

impl LeastConnectedLoadBalancingStrategy {
    pub fn new(metrics: Arc<dyn PoolMetrics>) -> Self {
        Self {
            readers_index: RoundRobinArrayIndex::default(),
            writers_index: RoundRobinArrayIndex::default(),
            metrics,
        }
    }

    fn select(
        &self,
        addresses: &[BoltServerAddress],
        index: &RoundRobinArrayIndex,
        role: &str,
    ) -> Option<BoltServerAddress> {
        let Some(start) = index.next(addresses.len()) else {
            tracing::warn!("Unable to select {}, no known addresses given", role);
            return None;
        };

        let mut least: Option<(&BoltServerAddress, usize)> = None;
        for offset in 0..addresses.len() {
            let address = &addresses[(start + offset) % addresses.len()];
            let in_use = self.metrics.in_use_connections(address);
            if least.map_or(true, |(_, fewest)| in_use < fewest) {
                least = Some((address, in_use));
            }
        }

        least.map(|(address, in_use)| {
            tracing::trace!("Selected {} with least in-use connections: {}", address, in_use);
            address.clone()
        })
    }
}

impl LoadBalancingStrategy for LeastConnectedLoadBalancingStrategy {
    fn select_reader(&self, known_readers: &[BoltServerAddress]) -> Option<BoltServerAddress> {
        self.select(known_readers, &self.readers_index, "reader")
    }

    fn select_writer(&self, known_writers: &[BoltServerAddress]) -> Option<BoltServerAddress> {
        self.select(known_writers, &self.writers_index, "writer")
    }
}
