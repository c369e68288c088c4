//! peerlink integration test harness.
//!
//! Every test runs real nodes in-process on 127.0.0.1 with OS-assigned
//! ports, so tests can run in parallel without stepping on each other.
//!
//!   cargo test --test integration

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use peerlink_core::config::PeerlinkConfig;
use peerlink_core::{Body, ChatMessage, Label, PeerAddress};
use peerlink_services::Frontend;
use peerlinkd::Node;

mod failures;
mod messaging;
mod sessions;
mod stress;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Frontend that records everything the node shows it.
#[derive(Default)]
pub struct Recorder {
    accept: AtomicBool,
    pub chats: Mutex<Vec<ChatMessage>>,
    pub requests: Mutex<Vec<PeerAddress>>,
    pub departures: Mutex<Vec<PeerAddress>>,
}

impl Recorder {
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn chat_lines(&self) -> Vec<String> {
        self.chats.lock().unwrap().iter().map(ToString::to_string).collect()
    }
}

impl Frontend for Recorder {
    fn approve_incoming(&self, from: &PeerAddress) -> bool {
        self.requests.lock().unwrap().push(from.clone());
        self.accept.load(Ordering::SeqCst)
    }

    fn display_chat(&self, message: &ChatMessage) {
        self.chats.lock().unwrap().push(message.clone());
    }

    fn peer_disconnected(&self, from: &PeerAddress) {
        self.departures.lock().unwrap().push(from.clone());
    }
}

pub fn loopback_config(label: &str) -> PeerlinkConfig {
    let mut config = PeerlinkConfig::default();
    config.node.label = label.to_string();
    config.node.listen_port = 0;
    config.node.bind_host = "127.0.0.1".to_string();
    config.node.advertise_host = "127.0.0.1".to_string();
    config.session.exchange_timeout_secs = 2;
    config.session.handshake_timeout_secs = 2;
    config.session.read_timeout_secs = 2;
    config
}

/// Start a listening node whose approval answer is `accept`.
pub async fn spawn_node(label: &str, accept: bool) -> Result<(Node, Arc<Recorder>)> {
    let recorder = Arc::new(Recorder::default());
    recorder.set_accept(accept);
    let node = Node::start(&loopback_config(label), recorder.clone())
        .await
        .with_context(|| format!("failed to start node {label}"))?;
    Ok((node, recorder))
}

/// An address with nothing listening on it.
pub async fn dead_address() -> Result<PeerAddress> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr.into())
}

pub fn body(text: &str) -> Body {
    Body::new(text).unwrap()
}

pub fn label(text: &str) -> Label {
    Label::new(text).unwrap()
}

/// Poll `check` until it holds, for up to two seconds. Used for effects
/// that have no reply to wait on, like disconnect notices.
pub async fn eventually(what: &str, check: impl Fn() -> bool) -> Result<()> {
    for _ in 0..100 {
        if check() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    bail!("timed out waiting for: {what}")
}
