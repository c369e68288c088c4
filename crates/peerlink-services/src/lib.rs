//! peerlink-services: shared node state and the frontend seam.

pub mod frontend;
pub mod peer;

pub use frontend::{ApprovalPolicy, Frontend};
pub use peer::{PeerRegistry, PeerSnapshot};
