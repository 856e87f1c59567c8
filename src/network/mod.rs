//! Network Module
//!
//! Blocking TCP connections, response dispatch and pooling.
//!
//! ## Architecture
//! - One `BoltConnection` per socket, owned by a single caller at a time
//! - Writes go through a shared `ChannelWriter` (the dispatcher sends RESET)
//! - Responses are correlated FIFO by the `ResponseDispatcher`
//! - Faults are funnelled through a `ChannelGuard` exactly once
//! - Idle connections are pooled per address

mod dispatcher;
mod guard;
mod channel;
mod connection;
mod pool;

pub use dispatcher::{
    Collected, DispatcherState, HandlerId, OutboundChannel, ResponseCollector, ResponseDispatcher,
    ResponseHandler,
};
pub use guard::{ChannelGuard, ConnectTimeoutGuard};
pub use channel::ChannelWriter;
pub use connection::{BoltConnection, QueryResult, QueryRunner};
pub use pool::{ConnectionPool, PoolMetrics, PooledConnection, TcpConnectionPool};
