//! peerlink wire format: the text messages exchanged between nodes.
//!
//! Every exchange is one TCP connection carrying one request and at most one
//! reply. A message is a single line of UTF-8 with space-delimited fields:
//!
//! ```text
//! <addr> CONNECT_REQUEST        handshake request
//! CONNECTED | REJECTED          handshake reply
//! <addr> <label> <body...>      chat message (body keeps its inner spaces)
//! <addr> DISCONNECTED           disconnect notice
//! [ACK] <note>                  chat acknowledgement
//! ```
//!
//! There is no version field, no length prefix and no framing. A receiver
//! performs one read of at most [`MAX_PAYLOAD`] bytes; anything longer is
//! truncated. That truncation is a known limitation of the protocol.
//!
//! This module is the only place that touches raw message text. Everything
//! above it works with [`Message`].

use std::fmt;

use bytes::Bytes;

use crate::address::PeerAddress;

// ── Keywords ──────────────────────────────────────────────────────────────────

const CONNECT_REQUEST: &str = "CONNECT_REQUEST";
const CONNECTED: &str = "CONNECTED";
const REJECTED: &str = "REJECTED";
const DISCONNECTED: &str = "DISCONNECTED";
const ACK_PREFIX: &str = "[ACK]";
/// An acknowledgement is `[ACK]` alone or `[ACK]` followed by a space. A
/// request whose address merely starts with `[ACK]` is not one.
const ACK_TOKEN: &str = "[ACK] ";

/// Chat body that tells the receiver the sender is leaving.
/// Compared case-insensitively.
pub const EXIT_SENTINEL: &str = "exit";

// ── Constants ─────────────────────────────────────────────────────────────────

/// Maximum bytes read for one message. Longer payloads are truncated.
pub const MAX_PAYLOAD: usize = 1024;

/// Default bound on connect and chat-reply waits, in seconds.
pub const EXCHANGE_TIMEOUT_SECS: u64 = 5;

/// Default bound on waiting for a handshake reply, in seconds.
/// The remote side is waiting on a human, so this is much longer.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 60;

/// Default bound on the inbound read of a request, in seconds.
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Accept loop poll interval in milliseconds.
pub const ACCEPT_POLL_MS: u64 = 1000;

// ── Field types ───────────────────────────────────────────────────────────────

/// Sender's team name. A single whitespace-free token, since the chat form
/// relies on the first two spaces to find the body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Result<Self, WireError> {
        let label = label.into();
        if label.is_empty() || label.chars().any(char::is_whitespace) {
            return Err(WireError::InvalidLabel(label));
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque chat text. Never parsed. Trailing whitespace is dropped because
/// the receiver trims the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Body(String);

impl Body {
    pub fn new(body: impl Into<String>) -> Result<Self, WireError> {
        let body = body.into();
        let trimmed = body.trim_end();
        if trimmed.trim_start().is_empty() {
            return Err(WireError::EmptyBody);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the body is the leave sentinel.
    pub fn is_exit(&self) -> bool {
        self.0.eq_ignore_ascii_case(EXIT_SENTINEL)
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free text carried by an acknowledgement. Trimmed on construction, since
/// the receiver trims the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AckNote(String);

impl AckNote {
    pub fn new(note: impl AsRef<str>) -> Self {
        Self(note.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AckNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// A chat line from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub from: PeerAddress,
    pub label: Label,
    pub body: Body,
}

impl fmt::Display for ChatMessage {
    /// Display form shown to the user: `host:port [label]: body`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.from, self.label, self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ConnectRequest { from: PeerAddress },
    ConnectReply { accepted: bool },
    Chat(ChatMessage),
    DisconnectNotice { from: PeerAddress },
    Ack { note: AckNote },
}

impl Message {
    /// Build a chat message, validating label and body.
    pub fn chat(
        from: PeerAddress,
        label: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, WireError> {
        Ok(Message::Chat(ChatMessage {
            from,
            label: Label::new(label)?,
            body: Body::new(body)?,
        }))
    }

    pub fn ack(note: impl AsRef<str>) -> Self {
        Message::Ack {
            note: AckNote::new(note),
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::ConnectRequest { .. } => "connect_request",
            Message::ConnectReply { .. } => "connect_reply",
            Message::Chat(_) => "chat",
            Message::DisconnectNotice { .. } => "disconnect_notice",
            Message::Ack { .. } => "ack",
        }
    }

    /// Encode to a wire payload. Total for any constructed message.
    pub fn encode(&self) -> Bytes {
        let text = match self {
            Message::ConnectRequest { from } => format!("{from} {CONNECT_REQUEST}"),
            Message::ConnectReply { accepted: true } => CONNECTED.to_string(),
            Message::ConnectReply { accepted: false } => REJECTED.to_string(),
            Message::Chat(chat) => format!("{} {} {}", chat.from, chat.label, chat.body),
            Message::DisconnectNotice { from } => format!("{from} {DISCONNECTED}"),
            Message::Ack { note } if note.is_empty() => ACK_PREFIX.to_string(),
            Message::Ack { note } => format!("{ACK_PREFIX} {note}"),
        };
        Bytes::from(text)
    }

    /// Decode a wire payload.
    ///
    /// Surrounding whitespace is ignored. Invalid UTF-8, which a truncated
    /// read can produce, is replaced rather than rejected.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let text = String::from_utf8_lossy(payload);
        let text = text.trim();

        match text {
            CONNECTED => return Ok(Message::ConnectReply { accepted: true }),
            REJECTED => return Ok(Message::ConnectReply { accepted: false }),
            _ => {}
        }

        if text == ACK_PREFIX {
            return Ok(Message::ack(""));
        }
        if let Some(note) = text.strip_prefix(ACK_TOKEN) {
            return Ok(Message::ack(note));
        }

        let fields: Vec<&str> = text.splitn(3, ' ').collect();
        let from = fields.first().and_then(|f| f.parse::<PeerAddress>().ok());
        let malformed = || WireError::Malformed {
            raw: text.to_string(),
            peer: from.clone(),
        };

        let Some(sender) = from.clone() else {
            return Err(malformed());
        };

        match fields.as_slice() {
            [_, CONNECT_REQUEST] => Ok(Message::ConnectRequest { from: sender }),
            [_, DISCONNECTED] => Ok(Message::DisconnectNotice { from: sender }),
            [_, label, body] => {
                let label = Label::new(*label).map_err(|_| malformed())?;
                let body = Body::new(*body).map_err(|_| malformed())?;
                Ok(Message::Chat(ChatMessage {
                    from: sender,
                    label,
                    body,
                }))
            }
            _ => Err(malformed()),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("malformed message from {}: {raw:?}", peer_or_unknown(.peer))]
    Malformed {
        raw: String,
        peer: Option<PeerAddress>,
    },

    #[error("label must be a single non-empty token: {0:?}")]
    InvalidLabel(String),

    #[error("chat body is empty")]
    EmptyBody,

    #[error("expected {expected}, got {got}")]
    Unexpected {
        expected: &'static str,
        got: &'static str,
    },
}

fn peer_or_unknown(peer: &Option<PeerAddress>) -> String {
    peer.as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown peer".to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
