//! Cluster composition
//!
//! Parsed result of the routing procedure.
//!
//! ```text
//! ttl     : Integer (seconds)
//! servers : [ {role: "WRITE", addresses: ["host:port", ...]},
//!             {role: "READ",  addresses: [...]},
//!             {role: "ROUTE", addresses: [...]} ]
//! ```

use std::time::Duration;

use crate::error::{BoltError, Result};
use crate::network::QueryResult;
use crate::packstream::Value;
use super::BoltServerAddress;

/// Servers of a cluster by role, valid for `ttl`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterComposition {
    pub ttl: Duration,
    pub readers: Vec<BoltServerAddress>,
    pub writers: Vec<BoltServerAddress>,
    pub routers: Vec<BoltServerAddress>,
}

impl ClusterComposition {
    pub fn new(
        ttl: Duration,
        readers: Vec<BoltServerAddress>,
        writers: Vec<BoltServerAddress>,
        routers: Vec<BoltServerAddress>,
    ) -> Self {
        Self {
            ttl,
            readers,
            writers,
            routers,
        }
    }

    pub fn has_writers(&self) -> bool {
        !self.writers.is_empty()
    }

    pub fn has_routers_and_readers(&self) -> bool {
        !self.routers.is_empty() && !self.readers.is_empty()
    }

    /// Parse the single record returned by the routing procedure
    pub fn parse(result: &QueryResult) -> Result<Self> {
        let record = match result.records.as_slice() {
            [record] => record,
            records => {
                return Err(invalid(format!(
                    "records received '{}' is too few or too many",
                    records.len()
                )))
            }
        };

        let field = |key: &str| {
            result
                .index_of(key)
                .and_then(|i| record.get(i))
                .ok_or_else(|| invalid(format!("missing field '{}'", key)))
        };

        let ttl = field("ttl")?
            .as_int()
            .ok_or_else(|| invalid("'ttl' is not an integer".to_string()))?;
        let ttl = Duration::from_secs(u64::try_from(ttl).unwrap_or(0));

        let servers = field("servers")?
            .as_list()
            .ok_or_else(|| invalid("'servers' is not a list".to_string()))?;

        let mut composition = Self::new(ttl, Vec::new(), Vec::new(), Vec::new());
        for server in servers {
            let server = server
                .as_map()
                .ok_or_else(|| invalid("server entry is not a map".to_string()))?;
            let role = server.get("role").and_then(Value::as_str).unwrap_or_default();
            let addresses = server
                .get("addresses")
                .and_then(Value::as_list)
                .ok_or_else(|| invalid(format!("no addresses for role '{}'", role)))?
                .iter()
                .map(|address| {
                    address
                        .as_str()
                        .ok_or_else(|| invalid("address is not a string".to_string()))
                        .and_then(|a| BoltServerAddress::parse(a).map_err(|e| invalid(e.to_string())))
                })
                .collect::<Result<Vec<_>>>()?;

            match role {
                "READ" => composition.readers.extend(addresses),
                "WRITE" => composition.writers.extend(addresses),
                "ROUTE" => composition.routers.extend(addresses),
                other => tracing::debug!("Ignoring servers with unknown role '{}'", other),
            }
        }

        if !composition.has_routers_and_readers() {
            return Err(invalid(format!(
                "no routers or readers in routing table: {} routers, {} readers",
                composition.routers.len(),
                composition.readers.len()
            )));
        }
        Ok(composition)
    }
}

fn invalid(detail: String) -> BoltError {
    BoltError::Protocol(format!(
        "Failed to parse result received from server due to: {}",
        detail
    ))
}
