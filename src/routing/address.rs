//! Server address

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{BoltError, Result};

/// Port used when an address omits one
pub const DEFAULT_PORT: u16 = 7687;

/// Host and port of one cluster member
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoltServerAddress {
    host: String,
    port: u16,
}

impl BoltServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port` or `[v6]:port`
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        let address = address.strip_prefix("bolt://").unwrap_or(address);
        if address.is_empty() {
            return Err(BoltError::Config("Empty server address".to_string()));
        }

        if let Some(rest) = address.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| BoltError::Config(format!("Invalid address: {}", address)))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port, address)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(BoltError::Config(format!("Invalid address: {}", address))),
            };
            return Ok(Self::new(host, port));
        }

        match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => Ok(Self::new(host, parse_port(port, address)?)),
            _ => Ok(Self::new(address, DEFAULT_PORT)),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to the first socket address
    pub fn resolve(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| BoltError::ServiceUnavailable(format!("Unable to resolve {}", self)))
    }
}

fn parse_port(port: &str, address: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| BoltError::Config(format!("Invalid port in address: {}", address)))
}

impl fmt::Display for BoltServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for BoltServerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}
