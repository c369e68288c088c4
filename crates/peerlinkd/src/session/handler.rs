//! Inbound connection handler.
//!
//! One handler per accepted connection:
//! Accepted → Reading → Dispatching → Replying → Closed.
//! Every path ends with the connection closed. Failures are logged and never
//! reach the accept loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use peerlink_core::wire::MAX_PAYLOAD;
use peerlink_core::{ChatMessage, Message, PeerAddress};
use peerlink_services::{Frontend, PeerRegistry};

use super::{read_payload, write_payload};

/// Everything a handler needs, shared by all handlers of one listener.
pub struct HandlerContext {
    pub registry: PeerRegistry,
    pub frontend: Arc<dyn Frontend>,
    /// Our own listening port, quoted in chat acknowledgements.
    pub local_port: u16,
    pub read_timeout: Duration,
}

/// Serve one connection to completion.
pub async fn handle_connection(mut stream: TcpStream, remote: SocketAddr, ctx: Arc<HandlerContext>) {
    match serve(&mut stream, remote, &ctx).await {
        Ok(()) => tracing::debug!(%remote, "connection closed"),
        Err(e) => tracing::warn!(%remote, error = %e, "connection closed with error"),
    }
}

async fn serve(stream: &mut TcpStream, remote: SocketAddr, ctx: &HandlerContext) -> io::Result<()> {
    let payload = timeout(ctx.read_timeout, read_payload(stream))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "timed out waiting for request"))??;

    if payload.iter().all(u8::is_ascii_whitespace) {
        tracing::debug!(%remote, "empty payload, closing");
        return Ok(());
    }
    if payload.len() == MAX_PAYLOAD {
        tracing::debug!(%remote, "payload filled the read buffer, may be truncated");
    }
    tracing::trace!(%remote, raw = %String::from_utf8_lossy(&payload), "received payload");

    let message = match Message::decode(&payload) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(%remote, error = %e, "invalid format, dropping connection");
            return Ok(());
        }
    };

    if let Some(reply) = dispatch(message, remote, ctx).await {
        tracing::debug!(%remote, kind = reply.kind(), "replying");
        write_payload(stream, reply.encode()).await?;
    }
    Ok(())
}

async fn dispatch(message: Message, remote: SocketAddr, ctx: &HandlerContext) -> Option<Message> {
    match message {
        Message::ConnectRequest { from } => Some(handle_connect_request(from, ctx).await),
        Message::Chat(chat) => Some(handle_chat(chat, ctx)),
        Message::DisconnectNotice { from } => {
            handle_disconnect(from, ctx);
            None
        }
        other @ (Message::ConnectReply { .. } | Message::Ack { .. }) => {
            tracing::warn!(%remote, kind = other.kind(), "reply received as a request, ignoring");
            None
        }
    }
}

async fn handle_connect_request(from: PeerAddress, ctx: &HandlerContext) -> Message {
    tracing::info!(peer = %from, "connection request received");

    // The frontend may wait on a human; keep that off the async workers.
    let frontend = Arc::clone(&ctx.frontend);
    let requester = from.clone();
    let accepted = match tokio::task::spawn_blocking(move || frontend.approve_incoming(&requester)).await {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::warn!(peer = %from, error = %e, "approval callback failed, rejecting");
            false
        }
    };

    if accepted {
        ctx.registry.add_peer(&from);
        tracing::info!(peer = %from, "connection request accepted");
    } else {
        tracing::info!(peer = %from, "connection request rejected");
    }
    Message::ConnectReply { accepted }
}

fn handle_chat(chat: ChatMessage, ctx: &HandlerContext) -> Message {
    ctx.frontend.display_chat(&chat);

    // Any chat (re-)establishes the sender as active.
    ctx.registry.add_peer(&chat.from);
    if chat.body.is_exit() {
        ctx.registry.remove_active(&chat.from);
        tracing::info!(peer = %chat.from, "peer left");
    }

    Message::ack(format!("Message received from {}", ctx.local_port))
}

fn handle_disconnect(from: PeerAddress, ctx: &HandlerContext) {
    tracing::info!(peer = %from, "peer disconnected");
    ctx.registry.remove_active(&from);
    ctx.frontend.peer_disconnected(&from);
}
