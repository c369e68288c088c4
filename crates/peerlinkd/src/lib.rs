//! peerlinkd: a peer node made of the inbound listener, outbound sessions
//! and the operator console built on top of them.

pub mod console;
pub mod node;
pub mod session;

pub use node::Node;
