//! peerlink-core: peer addresses, wire format, configuration and errors.
//! All other peerlink crates depend on this one.

pub mod address;
pub mod config;
pub mod error;
pub mod wire;

pub use address::{AddressError, PeerAddress};
pub use error::{NodeError, SessionError};
pub use wire::{AckNote, Body, ChatMessage, Label, Message, WireError};
