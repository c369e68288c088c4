//! Session management: one short-lived TCP exchange per message.
//!
//! Inbound: [`listener`] accepts, [`handler`] serves one request per
//! connection. Outbound: [`initiator`] opens a connection per operation.

pub mod handler;
pub mod initiator;
pub mod listener;

pub use handler::HandlerContext;
pub use initiator::{ExchangeOutcome, SessionInitiator};
pub use listener::{Listener, ListenerHandle, ListenerState};

use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use peerlink_core::wire::MAX_PAYLOAD;

/// Read one message: a single read of at most `MAX_PAYLOAD` bytes.
///
/// Anything beyond the first read is left unread. An empty result means the
/// peer closed without sending.
pub(crate) async fn read_payload<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; MAX_PAYLOAD];
    let len = reader.read(&mut buf).await?;
    buf.truncate(len);
    Ok(buf)
}

pub(crate) async fn write_payload<W>(writer: &mut W, payload: Bytes) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&payload).await?;
    writer.flush().await
}
