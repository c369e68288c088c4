use crate::*;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A chats to B: B shows the line and marks A active, A gets B's ack.
#[tokio::test]
async fn chat_is_displayed_and_acknowledged() -> Result<()> {
    let (a, _a_frontend) = spawn_node("teamA", false).await?;
    let (b, b_frontend) = spawn_node("teamB", false).await?;
    let b_addr = b.local_address().clone();

    let ack = a.send_chat(&b_addr, a.label(), &body("hello")).await?;

    assert_eq!(ack, format!("Message received from {}", b_addr.port()));
    assert_eq!(
        b_frontend.chat_lines(),
        vec![format!("{} [teamA]: hello", a.local_address())]
    );
    assert!(b.registry().is_active(a.local_address()));
    assert!(a.registry().is_active(&b_addr));
    Ok(())
}

#[tokio::test]
async fn exit_body_removes_sender_from_active() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let (b, b_frontend) = spawn_node("teamB", false).await?;
    let b_addr = b.local_address().clone();

    a.send_chat(&b_addr, a.label(), &body("hi")).await?;
    assert!(b.registry().is_active(a.local_address()));

    a.send_chat(&b_addr, a.label(), &body("Exit")).await?;

    let peers = b.list_peers();
    assert!(!peers.active.contains(a.local_address()));
    assert!(peers.ever_seen.contains(a.local_address()));
    assert_eq!(b_frontend.chats.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn label_and_body_survive_the_wire() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let (b, b_frontend) = spawn_node("teamB", false).await?;

    a.send_chat(b.local_address(), &label("ops-room"), &body("two  spaces and: colons"))
        .await?;

    let chats = b_frontend.chats.lock().unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(&chats[0].from, a.local_address());
    assert_eq!(chats[0].label.as_str(), "ops-room");
    assert_eq!(chats[0].body.as_str(), "two  spaces and: colons");
    Ok(())
}

/// Peers speaking the plain text format directly, without a Node.
#[tokio::test]
async fn raw_client_gets_text_ack() -> Result<()> {
    let (b, b_frontend) = spawn_node("teamB", false).await?;

    let mut client = TcpStream::connect(("127.0.0.1", b.local_address().port())).await?;
    client.write_all(b"192.168.1.20:9000 blue good morning").await?;
    let mut reply = String::new();
    client.read_to_string(&mut reply).await?;

    assert_eq!(
        reply,
        format!("[ACK] Message received from {}", b.local_address().port())
    );
    assert_eq!(
        b_frontend.chat_lines(),
        vec!["192.168.1.20:9000 [blue]: good morning".to_string()]
    );
    Ok(())
}
