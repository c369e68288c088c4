//! Frontend trait: the interactive side of a node.
//!
//! The connection handler calls into this for the two things it cannot
//! decide on its own: whether to accept a peering request, and how to show
//! an incoming chat. `approve_incoming` may block on a human answering a
//! prompt; the daemon calls it from a blocking-capable thread. The other
//! methods should return quickly.

use std::collections::HashSet;

use peerlink_core::config::ApprovalConfig;
use peerlink_core::{ChatMessage, PeerAddress};

pub trait Frontend: Send + Sync {
    /// Decide on an incoming connection request from `from`.
    fn approve_incoming(&self, from: &PeerAddress) -> bool;

    /// Show a chat message that just arrived.
    fn display_chat(&self, message: &ChatMessage);

    /// A peer told us it is disconnecting.
    fn peer_disconnected(&self, _from: &PeerAddress) {}
}

/// Pre-approval rules from the `[approval]` config section. Requests they do
/// not permit are left to the operator.
#[derive(Debug, Clone, Default)]
pub struct ApprovalPolicy {
    auto_accept: bool,
    allowed: HashSet<PeerAddress>,
}

impl ApprovalPolicy {
    pub fn accept_all() -> Self {
        Self {
            auto_accept: true,
            allowed: HashSet::new(),
        }
    }

    pub fn reject_all() -> Self {
        Self::default()
    }

    /// Build from config. Unparseable entries are logged and skipped.
    pub fn from_config(config: &ApprovalConfig) -> Self {
        let mut allowed = HashSet::new();
        for entry in &config.allowed_peers {
            match entry.parse::<PeerAddress>() {
                Ok(addr) => {
                    allowed.insert(addr);
                }
                Err(e) => tracing::warn!(entry = %entry, error = %e, "ignoring allowed peer"),
            }
        }
        Self {
            auto_accept: config.auto_accept,
            allowed,
        }
    }

    pub fn permits(&self, from: &PeerAddress) -> bool {
        self.auto_accept || self.allowed.contains(from)
    }
}
