//! Peer addresses: the `host:port` identity of a node.
//!
//! The canonical string form is both the wire representation and the
//! registry key, so `Display` and `FromStr` must stay exact inverses.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// A remote node, identified by `(host, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    /// Build an address from parts. The host must be non-empty and free of
    /// whitespace, otherwise it could not survive the space-delimited wire.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, AddressError> {
        let host = host.into();
        if host.is_empty() {
            return Err(AddressError::EmptyHost);
        }
        if host.chars().any(char::is_whitespace) {
            return Err(AddressError::WhitespaceInHost(host));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Same host, different port.
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            host: self.host.clone(),
            port,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;
        Self::new(host, port)
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("peer address has an empty host")]
    EmptyHost,

    #[error("peer host contains whitespace: {0:?}")]
    WhitespaceInHost(String),

    #[error("peer address {0:?} is missing a :port suffix")]
    MissingPort(String),

    #[error("peer address {0:?} has an invalid port")]
    InvalidPort(String),
}
