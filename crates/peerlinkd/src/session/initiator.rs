//! Outbound session initiator.
//!
//! Each operation opens a fresh connection, performs one request/response
//! exchange, closes, and corrects the peer registry from the outcome.
//! Failures are returned to the caller as recoverable [`SessionError`]s.

use std::io;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use peerlink_core::config::SessionConfig;
use peerlink_core::{Body, ChatMessage, Label, Message, PeerAddress, SessionError, WireError};
use peerlink_services::PeerRegistry;

use super::{read_payload, write_payload};

/// Per-peer result of a bulk operation.
pub type ExchangeOutcome = (PeerAddress, Result<(), SessionError>);

pub struct SessionInitiator {
    registry: PeerRegistry,
    /// Our own address, sent as `from` in every request.
    local: PeerAddress,
    exchange_timeout: Duration,
    handshake_timeout: Duration,
}

impl SessionInitiator {
    pub fn new(registry: PeerRegistry, local: PeerAddress, session: &SessionConfig) -> Self {
        Self {
            registry,
            local,
            exchange_timeout: session.exchange_timeout(),
            handshake_timeout: session.handshake_timeout(),
        }
    }

    pub fn local_address(&self) -> &PeerAddress {
        &self.local
    }

    /// Follow the listener to a new port.
    pub fn set_local_port(&mut self, port: u16) {
        self.local = self.local.with_port(port);
    }

    /// Send a chat message and wait for the acknowledgement.
    ///
    /// Returns the acknowledgement text. A peer that cannot be reached or
    /// does not answer in time is dropped from the active set.
    pub async fn send_chat(
        &self,
        peer: &PeerAddress,
        label: &Label,
        body: &Body,
    ) -> Result<String, SessionError> {
        let request = Message::Chat(ChatMessage {
            from: self.local.clone(),
            label: label.clone(),
            body: body.clone(),
        });

        let reply = match self.exchange(peer, &request, self.exchange_timeout).await {
            Ok(reply) => reply,
            Err(e) => {
                if matches!(e, SessionError::PeerUnreachable { .. } | SessionError::ReplyTimeout(_)) {
                    tracing::warn!(%peer, error = %e, "peer unreachable, removing from active peers");
                    self.registry.remove_active(peer);
                } else {
                    tracing::warn!(%peer, error = %e, "failed to send message");
                }
                return Err(e);
            }
        };

        // Older peers may answer with free text; show it as-is.
        let note = match Message::decode(&reply) {
            Ok(Message::Ack { note }) => note.into_string(),
            _ => String::from_utf8_lossy(&reply).trim().to_string(),
        };
        tracing::info!(%peer, reply = %note, "message delivered");

        self.registry.add_peer(peer);
        Ok(note)
    }

    /// Ask `peer` to accept us. On acceptance the peer becomes active.
    pub async fn send_connect_request(&self, peer: &PeerAddress) -> Result<(), SessionError> {
        let request = Message::ConnectRequest {
            from: self.local.clone(),
        };

        let result = self.handshake(peer, &request).await;
        match &result {
            Ok(()) => {
                self.registry.add_peer(peer);
                tracing::info!(%peer, "connected");
            }
            Err(SessionError::Rejected(_)) => {
                tracing::info!(%peer, "connection request was rejected");
            }
            Err(e) => tracing::warn!(%peer, error = %e, "connection request failed"),
        }
        result
    }

    /// Tell `peer` we are leaving, then forget it as active whatever the
    /// outcome of the notification.
    pub async fn disconnect_one(&self, peer: &PeerAddress) -> Result<(), SessionError> {
        let result = self.notify_disconnect(peer).await;
        self.registry.remove_active(peer);
        result
    }

    /// Clear the active set and notify every peer it held.
    pub async fn disconnect_all(&self) -> Vec<ExchangeOutcome> {
        let mut peers: Vec<_> = self.registry.reset_active_to_empty().into_iter().collect();
        peers.sort();

        let mut outcomes = Vec::with_capacity(peers.len());
        for peer in peers {
            let result = self.notify_disconnect(&peer).await;
            outcomes.push((peer, result));
        }
        outcomes
    }

    /// Repeat the handshake with every active peer. Peers that refuse the
    /// connection are pruned from the active set.
    pub async fn reconnect_active(&self) -> Vec<ExchangeOutcome> {
        let mut peers: Vec<_> = self.registry.list_active().into_iter().collect();
        if peers.is_empty() {
            tracing::info!("no active peers to reconnect to");
            return Vec::new();
        }
        peers.sort();

        let mut outcomes = Vec::with_capacity(peers.len());
        for peer in peers {
            let result = self.send_connect_request(&peer).await;
            if let Err(e) = &result {
                if e.is_unreachable() {
                    tracing::warn!(%peer, "pruning unreachable peer");
                    self.registry.remove_active(&peer);
                }
            }
            outcomes.push((peer, result));
        }
        outcomes
    }

    // ── Exchanges ─────────────────────────────────────────────────────────────

    async fn handshake(&self, peer: &PeerAddress, request: &Message) -> Result<(), SessionError> {
        let reply = self.exchange(peer, request, self.handshake_timeout).await?;
        if reply.is_empty() {
            return Err(SessionError::NoReply(peer.clone()));
        }

        match Message::decode(&reply) {
            Ok(Message::ConnectReply { accepted: true }) => Ok(()),
            Ok(Message::ConnectReply { accepted: false }) => Err(SessionError::Rejected(peer.clone())),
            Ok(other) => Err(SessionError::Wire {
                peer: peer.clone(),
                source: WireError::Unexpected {
                    expected: "connect_reply",
                    got: other.kind(),
                },
            }),
            Err(source) => Err(SessionError::Wire {
                peer: peer.clone(),
                source,
            }),
        }
    }

    async fn notify_disconnect(&self, peer: &PeerAddress) -> Result<(), SessionError> {
        let notice = Message::DisconnectNotice {
            from: self.local.clone(),
        };

        let result = async {
            let mut stream = self.connect(peer).await?;
            write_payload(&mut stream, notice.encode())
                .await
                .map_err(|e| classify(peer, e))?;
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(%peer, error = %e, "shutdown after disconnect notice failed");
            }
            Ok::<(), SessionError>(())
        }
        .await;

        match &result {
            Ok(()) => tracing::info!(%peer, "disconnected"),
            Err(e) => tracing::warn!(%peer, error = %e, "disconnect notice not delivered"),
        }
        result
    }

    /// Send `request` and return the raw reply, possibly empty.
    async fn exchange(
        &self,
        peer: &PeerAddress,
        request: &Message,
        reply_timeout: Duration,
    ) -> Result<Vec<u8>, SessionError> {
        let mut stream = self.connect(peer).await?;

        write_payload(&mut stream, request.encode())
            .await
            .map_err(|e| classify(peer, e))?;
        tracing::debug!(%peer, kind = request.kind(), "request sent");

        let reply = timeout(reply_timeout, read_payload(&mut stream))
            .await
            .map_err(|_| SessionError::ReplyTimeout(peer.clone()))?
            .map_err(|e| classify(peer, e))?;
        tracing::trace!(%peer, raw = %String::from_utf8_lossy(&reply), "reply received");
        Ok(reply)
    }

    async fn connect(&self, peer: &PeerAddress) -> Result<TcpStream, SessionError> {
        match timeout(self.exchange_timeout, TcpStream::connect((peer.host(), peer.port()))).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(classify(peer, e)),
            Err(_) => Err(SessionError::PeerUnreachable {
                peer: peer.clone(),
                reason: "connect timed out".to_string(),
            }),
        }
    }
}

/// Refused and timed-out connections mean the peer is gone; anything else
/// is a transient failure.
fn classify(peer: &PeerAddress, e: io::Error) -> SessionError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut => SessionError::PeerUnreachable {
            peer: peer.clone(),
            reason: e.to_string(),
        },
        _ => SessionError::Io {
            peer: peer.clone(),
            source: e,
        },
    }
}
