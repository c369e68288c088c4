use crate::*;

use futures::future::join_all;

const SENDERS: usize = 50;

/// Fifty nodes chat to one receiver at once; none of the registrations
/// may be lost.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inbound_chats_are_all_registered() -> Result<()> {
    let (receiver, frontend) = spawn_node("hub", false).await?;
    let target = receiver.local_address().clone();

    let mut senders = Vec::with_capacity(SENDERS);
    for i in 0..SENDERS {
        let (node, _) = spawn_node(&format!("team{i}"), false).await?;
        senders.push(node);
    }

    let ping = body("ping");
    let results = join_all(
        senders
            .iter()
            .map(|node| node.send_chat(&target, node.label(), &ping)),
    )
    .await;

    for (node, result) in senders.iter().zip(&results) {
        assert!(result.is_ok(), "{} failed: {result:?}", node.local_address());
    }

    let peers = receiver.list_peers();
    assert_eq!(peers.ever_seen.len(), SENDERS);
    assert_eq!(peers.active.len(), SENDERS);
    for node in &senders {
        assert!(peers.active.contains(node.local_address()));
    }
    assert_eq!(frontend.chats.lock().unwrap().len(), SENDERS);
    Ok(())
}

/// Chats and disconnect notices racing on the same registry keep
/// active a subset of ever-seen.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_traffic_keeps_registry_consistent() -> Result<()> {
    let (receiver, _) = spawn_node("hub", true).await?;
    let target = receiver.local_address().clone();

    let mut senders = Vec::new();
    for i in 0..20 {
        let (node, _) = spawn_node(&format!("team{i}"), false).await?;
        senders.push(node);
    }

    join_all(senders.iter().map(|node| node.send_connect_request(&target))).await;
    let departing = &senders[..10];
    let chatting = &senders[10..];

    let leaves = join_all(departing.iter().map(|node| node.disconnect_one(&target)));
    let text = body("still here");
    let chats = join_all(
        chatting
            .iter()
            .map(|node| node.send_chat(&target, node.label(), &text)),
    );
    let (left, chatted) = tokio::join!(leaves, chats);
    assert!(left.iter().all(Result::is_ok));
    assert!(chatted.iter().all(Result::is_ok));

    eventually("departures to land", || receiver.registry().active_len() == 10).await?;

    let peers = receiver.list_peers();
    assert_eq!(peers.ever_seen.len(), 20);
    assert!(peers.active.iter().all(|p| peers.ever_seen.contains(p)));
    for node in chatting {
        assert!(peers.active.contains(node.local_address()));
    }
    Ok(())
}
