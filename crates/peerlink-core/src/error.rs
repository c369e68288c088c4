//! Error taxonomy for the node.
//!
//! Only [`NodeError::Bind`] is fatal. Everything else is reported to the
//! caller or logged, and at most corrects the peer registry.

use std::net::SocketAddr;

use crate::address::{AddressError, PeerAddress};
use crate::wire::WireError;

/// Node lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid bind address {0:?}")]
    InvalidBindAddr(String),

    #[error("invalid node label: {0}")]
    InvalidLabel(#[source] WireError),

    #[error("invalid advertised address: {0}")]
    InvalidAdvertiseAddr(#[from] AddressError),

    #[error("listener is already running on port {0}")]
    ListenerAlreadyRunning(u16),

    #[error("listener is not running")]
    ListenerNotRunning,
}

/// Outcome of a failed outbound exchange. All variants are recoverable.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Nothing answered, or the exchange timed out.
    #[error("peer {peer} is unreachable: {reason}")]
    PeerUnreachable { peer: PeerAddress, reason: String },

    /// The peer's operator declined the handshake.
    #[error("connection request to {0} was rejected")]
    Rejected(PeerAddress),

    /// Connection dropped or failed mid-exchange.
    #[error("i/o error talking to {peer}: {source}")]
    Io {
        peer: PeerAddress,
        #[source]
        source: std::io::Error,
    },

    /// The peer replied with something other than what the exchange expects.
    #[error("unexpected reply from {peer}: {source}")]
    Wire {
        peer: PeerAddress,
        #[source]
        source: WireError,
    },

    /// Connected, but no reply arrived in time.
    #[error("timed out waiting for a reply from {0}")]
    ReplyTimeout(PeerAddress),

    /// The peer closed the connection without replying.
    #[error("{0} closed the connection without replying")]
    NoReply(PeerAddress),
}

impl SessionError {
    pub fn peer(&self) -> &PeerAddress {
        match self {
            SessionError::PeerUnreachable { peer, .. }
            | SessionError::Io { peer, .. }
            | SessionError::Wire { peer, .. } => peer,
            SessionError::Rejected(peer)
            | SessionError::ReplyTimeout(peer)
            | SessionError::NoReply(peer) => peer,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, SessionError::PeerUnreachable { .. })
    }
}
