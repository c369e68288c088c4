//! Node facade: the listener, the outbound initiator and the shared peer
//! registry, wired together from config.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use peerlink_core::config::PeerlinkConfig;
use peerlink_core::{Body, Label, NodeError, PeerAddress, SessionError};
use peerlink_services::{Frontend, PeerRegistry, PeerSnapshot};

use crate::session::{ExchangeOutcome, HandlerContext, Listener, ListenerHandle, SessionInitiator};

pub struct Node {
    registry: PeerRegistry,
    frontend: Arc<dyn Frontend>,
    initiator: SessionInitiator,
    label: Label,
    bind_host: String,
    read_timeout: Duration,
    listener: Option<ListenerHandle>,
}

impl Node {
    /// Build a node without binding anything.
    pub fn new(config: &PeerlinkConfig, frontend: Arc<dyn Frontend>) -> Result<Self, NodeError> {
        let label = Label::new(config.node.label.as_str()).map_err(NodeError::InvalidLabel)?;

        let host = if config.node.advertise_host.is_empty() {
            detect_advertise_host().to_string()
        } else {
            config.node.advertise_host.clone()
        };
        let local = PeerAddress::new(host, config.node.listen_port)?;

        let registry = PeerRegistry::new();
        let initiator = SessionInitiator::new(registry.clone(), local, &config.session);

        Ok(Self {
            registry,
            frontend,
            initiator,
            label,
            bind_host: config.node.bind_host.clone(),
            read_timeout: config.session.read_timeout(),
            listener: None,
        })
    }

    /// Build a node and start listening on the configured port.
    pub async fn start(config: &PeerlinkConfig, frontend: Arc<dyn Frontend>) -> Result<Self, NodeError> {
        let mut node = Self::new(config, frontend)?;
        node.start_listener(config.node.listen_port)?;
        Ok(node)
    }

    // ── Listener lifecycle ────────────────────────────────────────────────────

    /// Bind `port` (0 = OS-assigned) and start accepting. Returns the bound
    /// port, which also becomes the port we advertise to peers.
    pub fn start_listener(&mut self, port: u16) -> Result<u16, NodeError> {
        if let Some(handle) = &self.listener {
            return Err(NodeError::ListenerAlreadyRunning(handle.port()));
        }

        let listener = Listener::bind(&self.bind_host, port)?;
        let bound = listener.local_addr().port();
        self.initiator.set_local_port(bound);

        let ctx = Arc::new(HandlerContext {
            registry: self.registry.clone(),
            frontend: Arc::clone(&self.frontend),
            local_port: bound,
            read_timeout: self.read_timeout,
        });
        self.listener = Some(listener.spawn(ctx));

        tracing::info!(address = %self.initiator.local_address(), "node listening");
        Ok(bound)
    }

    pub async fn stop_listener(&mut self) -> Result<(), NodeError> {
        let mut handle = self.listener.take().ok_or(NodeError::ListenerNotRunning)?;
        handle.stop().await;
        Ok(())
    }

    pub fn listening_port(&self) -> Option<u16> {
        self.listener.as_ref().map(ListenerHandle::port)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// The address peers should use to reach us.
    pub fn local_address(&self) -> &PeerAddress {
        self.initiator.local_address()
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn list_peers(&self) -> PeerSnapshot {
        self.registry.snapshot()
    }

    // ── Outbound operations ───────────────────────────────────────────────────

    /// Send a chat message under `label`. Returns the peer's acknowledgement.
    pub async fn send_chat(
        &self,
        peer: &PeerAddress,
        label: &Label,
        body: &Body,
    ) -> Result<String, SessionError> {
        self.initiator.send_chat(peer, label, body).await
    }

    pub async fn send_connect_request(&self, peer: &PeerAddress) -> Result<(), SessionError> {
        self.initiator.send_connect_request(peer).await
    }

    pub async fn disconnect_one(&self, peer: &PeerAddress) -> Result<(), SessionError> {
        self.initiator.disconnect_one(peer).await
    }

    pub async fn disconnect_all(&self) -> Vec<ExchangeOutcome> {
        self.initiator.disconnect_all().await
    }

    pub async fn reconnect_active(&self) -> Vec<ExchangeOutcome> {
        self.initiator.reconnect_active().await
    }

    /// Notify active peers, then stop listening.
    pub async fn shutdown(mut self) {
        let notified = self.disconnect_all().await;
        if !notified.is_empty() {
            tracing::info!(peers = notified.len(), "notified peers of shutdown");
        }
        if self.listener.is_some() {
            let _ = self.stop_listener().await;
        }
    }
}

/// Find the address of the interface that routes outward. Connecting a UDP
/// socket sends nothing, it only selects a route.
fn detect_advertise_host() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            tracing::debug!(error = %e, "no outbound route, advertising loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
