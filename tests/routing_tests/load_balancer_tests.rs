//! Load Balancer Tests
//!
//! Acquisition against a scripted pool and provider.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use boltlink::error::{BoltError, Result, NOT_A_LEADER};
use boltlink::network::{ConnectionPool, PoolMetrics, QueryResult, QueryRunner};
use boltlink::packstream::Value;
use boltlink::routing::{
    AccessMode, BoltServerAddress, ClusterComposition, ClusterCompositionProvider, DatabaseContext,
    DatabaseName, LoadBalancer, RoundRobinLoadBalancingStrategy,
};
use boltlink::Config;

fn addr(port: u16) -> BoltServerAddress {
    BoltServerAddress::new("127.0.0.1", port)
}

fn composition(readers: &[u16], writers: &[u16]) -> ClusterComposition {
    let list = |ports: &[u16]| ports.iter().map(|p| addr(*p)).collect::<Vec<_>>();
    ClusterComposition::new(Duration::from_secs(300), list(readers), list(writers), vec![addr(9000)])
}

// =============================================================================
// Fakes
// =============================================================================

/// Same composition from every router
struct FixedProvider(Mutex<Result<ClusterComposition>>);

impl ClusterCompositionProvider for FixedProvider {
    fn get_cluster_composition(
        &self,
        _router: &BoltServerAddress,
        _context: &DatabaseContext,
    ) -> Result<ClusterComposition> {
        self.0.lock().clone()
    }
}

struct FakeConnection {
    query_error: Option<BoltError>,
}

impl QueryRunner for FakeConnection {
    fn run_query(&mut self, _query: &str, _parameters: BTreeMap<String, Value>) -> Result<QueryResult> {
        match &self.query_error {
            Some(e) => Err(e.clone()),
            None => Ok(QueryResult::default()),
        }
    }
}

#[derive(Default)]
struct FakePool {
    unreachable: Mutex<HashSet<BoltServerAddress>>,
    acquire_error: Mutex<Option<BoltError>>,
    query_error: Mutex<Option<BoltError>>,
    in_use: Mutex<HashMap<BoltServerAddress, usize>>,
    attempts: Mutex<Vec<BoltServerAddress>>,
    closed: AtomicBool,
}

impl FakePool {
    fn unreachable(&self, ports: &[u16]) {
        self.unreachable.lock().extend(ports.iter().map(|p| addr(*p)));
    }

    fn attempts(&self) -> Vec<BoltServerAddress> {
        self.attempts.lock().clone()
    }
}

impl PoolMetrics for FakePool {
    fn in_use_connections(&self, address: &BoltServerAddress) -> usize {
        self.in_use.lock().get(address).copied().unwrap_or(0)
    }
}

impl ConnectionPool for FakePool {
    type Connection = FakeConnection;

    fn acquire(&self, address: &BoltServerAddress) -> Result<FakeConnection> {
        self.attempts.lock().push(address.clone());
        if let Some(e) = self.acquire_error.lock().clone() {
            return Err(e);
        }
        if self.unreachable.lock().contains(address) {
            return Err(BoltError::ServiceUnavailable(format!("{} refused", address)));
        }
        Ok(FakeConnection {
            query_error: self.query_error.lock().clone(),
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

fn balancer(composition: Result<ClusterComposition>) -> (Arc<FakePool>, LoadBalancer<FakePool>) {
    let pool = Arc::new(FakePool::default());
    let provider = Arc::new(FixedProvider(Mutex::new(composition)));
    let balancer = LoadBalancer::with_strategy(
        addr(9000),
        &Config::default(),
        pool.clone(),
        provider,
        Box::new(RoundRobinLoadBalancingStrategy::new()),
    );
    (pool, balancer)
}

fn session_expired(err: BoltError) -> String {
    match err {
        BoltError::SessionExpired(message) => message,
        other => panic!("Expected session expired, got {:?}", other),
    }
}

// =============================================================================
// Acquire Tests
// =============================================================================

#[test]
fn test_acquire_reader_round_robin() {
    let (pool, balancer) = balancer(Ok(composition(&[1, 2], &[3])));
    let context = DatabaseContext::default();

    let first = balancer.acquire(AccessMode::Read, &context).unwrap();
    let second = balancer.acquire(AccessMode::Read, &context).unwrap();
    let writer = balancer.acquire(AccessMode::Write, &context).unwrap();

    assert_eq!(first.address(), &addr(1));
    assert_eq!(second.address(), &addr(2));
    assert_eq!(writer.address(), &addr(3));
    assert_eq!(writer.mode(), AccessMode::Write);
    assert_eq!(pool.attempts(), vec![addr(1), addr(2), addr(3)]);
}

#[test]
fn test_unreachable_reader_is_forgotten_and_next_tried() {
    let (pool, balancer) = balancer(Ok(composition(&[1, 2], &[3])));
    pool.unreachable(&[1]);
    let context = DatabaseContext::default();

    let connection = balancer.acquire(AccessMode::Read, &context).unwrap();

    assert_eq!(connection.address(), &addr(2));
    assert_eq!(pool.attempts(), vec![addr(1), addr(2)]);
    let table = balancer.routing_table(AccessMode::Read, &context).unwrap();
    assert_eq!(table.readers(), &[addr(2)]);
}

#[test]
fn test_unreachable_writer_is_not_offered_again() {
    let (pool, balancer) = balancer(Ok(composition(&[1], &[2, 3])));
    pool.unreachable(&[2]);
    let context = DatabaseContext::default();

    let first = balancer.acquire(AccessMode::Write, &context).unwrap();
    assert_eq!(first.address(), &addr(3));
    assert_eq!(pool.attempts(), vec![addr(2), addr(3)]);

    let second = balancer.acquire(AccessMode::Write, &context).unwrap();
    assert_eq!(second.address(), &addr(3));
    assert_eq!(pool.attempts(), vec![addr(2), addr(3), addr(3)]);
}

#[test]
fn test_all_writers_unreachable_expires_session() {
    let (pool, balancer) = balancer(Ok(composition(&[1], &[2, 3])));
    pool.unreachable(&[2, 3]);
    let context = DatabaseContext::new(DatabaseName::named("movies"));

    let err = balancer.acquire(AccessMode::Write, &context).err().unwrap();

    let message = session_expired(err);
    assert!(message.starts_with("Failed to obtain connection towards WRITE server."));
    assert!(message.contains("database=movies"));
    assert_eq!(pool.attempts(), vec![addr(2), addr(3)]);

    let handler = balancer.registry().get(&context.database).unwrap();
    assert!(handler.addresses(AccessMode::Write).is_empty());
    assert_eq!(handler.addresses(AccessMode::Read), vec![addr(1)]);
}

#[test]
fn test_no_writers_known() {
    let (pool, balancer) = balancer(Ok(composition(&[1], &[])));

    let err = balancer.acquire(AccessMode::Write, &DatabaseContext::default()).err().unwrap();

    assert!(session_expired(err).starts_with("No WRITE servers known."));
    assert!(pool.attempts().is_empty());
}

#[test]
fn test_other_acquire_errors_propagate_without_forgetting() {
    let (pool, balancer) = balancer(Ok(composition(&[1, 2], &[3])));
    *pool.acquire_error.lock() = Some(BoltError::Client("pool exhausted".to_string()));
    let context = DatabaseContext::default();

    let err = balancer.acquire(AccessMode::Read, &context).err().unwrap();

    assert!(matches!(err, BoltError::Client(_)));
    assert_eq!(pool.attempts().len(), 1);
    let handler = balancer.registry().get(&DatabaseName::Default).unwrap();
    assert_eq!(handler.addresses(AccessMode::Read), vec![addr(1), addr(2)]);
}

#[test]
fn test_failed_discovery_surfaces_and_drops_table() {
    let (pool, balancer) = balancer(Err(BoltError::ServiceUnavailable("router down".to_string())));

    let err = balancer.acquire(AccessMode::Read, &DatabaseContext::default()).err().unwrap();

    assert!(err.is_service_unavailable());
    assert!(pool.attempts().is_empty());
    assert!(balancer.registry().is_empty());
}

#[test]
fn test_close_closes_pool() {
    let (pool, balancer) = balancer(Ok(composition(&[1], &[2])));
    balancer.close();
    assert!(pool.closed.load(Ordering::Acquire));
}

#[test]
fn test_least_connected_from_config() {
    let pool = Arc::new(FakePool::default());
    pool.in_use.lock().insert(addr(1), 4);
    let provider = Arc::new(FixedProvider(Mutex::new(Ok(composition(&[1, 2], &[3])))));
    let balancer = LoadBalancer::new(addr(9000), &Config::default(), pool, provider);

    for _ in 0..3 {
        let connection = balancer.acquire(AccessMode::Read, &DatabaseContext::default()).unwrap();
        assert_eq!(connection.address(), &addr(2));
    }
}

// =============================================================================
// Routing Connection Tests
// =============================================================================

#[test]
fn test_unavailable_server_is_forgotten_after_query() {
    let (pool, balancer) = balancer(Ok(composition(&[1, 2], &[1])));
    *pool.query_error.lock() = Some(BoltError::ServiceUnavailable("connection reset".to_string()));
    let context = DatabaseContext::default();

    let mut connection = balancer.acquire(AccessMode::Read, &context).unwrap();
    let err = connection.run_query("RETURN 1", BTreeMap::new()).unwrap_err();

    assert!(session_expired(err).starts_with("Server at 127.0.0.1:1 is no longer available"));
    let table = balancer.registry().get(&DatabaseName::Default).unwrap().table();
    assert_eq!(table.readers(), &[addr(2)]);
    assert!(table.writers().is_empty());
}

#[test]
fn test_not_a_leader_forgets_writer() {
    let (pool, balancer) = balancer(Ok(composition(&[3], &[3, 4])));
    *pool.query_error.lock() = Some(BoltError::server(NOT_A_LEADER, "No write operations are allowed"));
    let context = DatabaseContext::default();

    let mut connection = balancer.acquire(AccessMode::Write, &context).unwrap();
    let err = connection.run_query("CREATE ()", BTreeMap::new()).unwrap_err();

    assert_eq!(session_expired(err), "Server at 127.0.0.1:3 no longer accepts writes");
    let table = balancer.registry().get(&DatabaseName::Default).unwrap().table();
    assert_eq!(table.writers(), &[addr(4)]);
    assert_eq!(table.readers(), &[addr(3)]);
}

#[test]
fn test_write_rejected_in_read_mode() {
    let (pool, balancer) = balancer(Ok(composition(&[3], &[3])));
    *pool.query_error.lock() = Some(BoltError::server(NOT_A_LEADER, "No write operations are allowed"));

    let mut connection = balancer.acquire(AccessMode::Read, &DatabaseContext::default()).unwrap();
    let err = connection.run_query("CREATE ()", BTreeMap::new()).unwrap_err();

    match err {
        BoltError::Client(message) => {
            assert_eq!(message, "Write queries cannot be performed in READ access mode.")
        }
        other => panic!("Expected client error, got {:?}", other),
    }
    let table = balancer.registry().get(&DatabaseName::Default).unwrap().table();
    assert_eq!(table.writers(), &[addr(3)]);
}

#[test]
fn test_other_query_errors_pass_through() {
    let (pool, balancer) = balancer(Ok(composition(&[1], &[2])));
    *pool.query_error.lock() = Some(BoltError::server("Neo.ClientError.Statement.SyntaxError", "oops"));

    let mut connection = balancer.acquire(AccessMode::Read, &DatabaseContext::default()).unwrap();
    let err = connection.run_query("RETRUN", BTreeMap::new()).unwrap_err();

    assert_eq!(err.code(), Some("Neo.ClientError.Statement.SyntaxError"));
    assert_eq!(connection.database(), &DatabaseName::Default);
}
