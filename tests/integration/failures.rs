use crate::*;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn chat_to_unreachable_peer_is_recoverable() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let dead = dead_address().await?;
    a.registry().add_peer(&dead);

    let err = a.send_chat(&dead, a.label(), &body("anyone?")).await.unwrap_err();

    assert!(err.is_unreachable(), "unexpected error: {err}");
    assert_eq!(err.peer(), &dead);
    assert!(!a.registry().is_active(&dead));
    assert!(a.list_peers().ever_seen.contains(&dead));

    // The node carries on.
    let (b, _) = spawn_node("teamB", false).await?;
    a.send_chat(b.local_address(), a.label(), &body("still here")).await?;
    Ok(())
}

#[tokio::test]
async fn connect_request_to_unreachable_peer_leaves_registry_alone() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let dead = dead_address().await?;

    let err = a.send_connect_request(&dead).await.unwrap_err();

    assert!(err.is_unreachable());
    assert_eq!(a.registry().ever_seen_len(), 0);
    Ok(())
}

/// Garbage is dropped without a reply and the listener keeps serving.
#[tokio::test]
async fn malformed_payload_is_dropped() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let (b, b_frontend) = spawn_node("teamB", false).await?;
    let port = b.local_address().port();

    for payload in [&b"garbage text here extra"[..], b"CONNECT_REQUEST", b"\xff\xfe\xfd"] {
        let mut client = TcpStream::connect(("127.0.0.1", port)).await?;
        client.write_all(payload).await?;
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await?;
        assert!(reply.is_empty(), "unexpected reply to {payload:?}: {reply:?}");
    }
    assert!(b_frontend.chats.lock().unwrap().is_empty());
    assert_eq!(b.registry().ever_seen_len(), 0);

    a.send_chat(b.local_address(), a.label(), &body("after the noise")).await?;
    assert_eq!(b_frontend.chats.lock().unwrap().len(), 1);
    Ok(())
}

/// A peer that accepts but never answers is treated as gone.
#[tokio::test]
async fn silent_peer_times_out() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let silent_addr: PeerAddress = silent.local_addr()?.into();
    let holder = tokio::spawn(async move {
        let (stream, _) = silent.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });
    a.registry().add_peer(&silent_addr);

    let err = a.send_chat(&silent_addr, a.label(), &body("hello?")).await.unwrap_err();

    assert!(matches!(err, peerlink_core::SessionError::ReplyTimeout(_)), "unexpected error: {err}");
    assert!(!a.registry().is_active(&silent_addr));
    holder.abort();
    Ok(())
}
