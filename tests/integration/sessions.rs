use crate::*;

use peerlink_core::SessionError;

#[tokio::test]
async fn accepted_request_connects_both_sides() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let (b, b_frontend) = spawn_node("teamB", true).await?;

    a.send_connect_request(b.local_address()).await?;

    assert_eq!(*b_frontend.requests.lock().unwrap(), vec![a.local_address().clone()]);
    assert!(a.registry().is_active(b.local_address()));
    assert!(b.registry().is_active(a.local_address()));
    Ok(())
}

#[tokio::test]
async fn rejected_request_changes_neither_registry() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let (b, b_frontend) = spawn_node("teamB", false).await?;

    let err = a.send_connect_request(b.local_address()).await.unwrap_err();

    assert!(matches!(err, SessionError::Rejected(ref p) if p == b.local_address()));
    assert_eq!(b_frontend.requests.lock().unwrap().len(), 1);
    assert_eq!(a.registry().ever_seen_len(), 0);
    assert_eq!(b.registry().ever_seen_len(), 0);
    Ok(())
}

/// A receiving node drops a peer from active when told it is leaving.
#[tokio::test]
async fn disconnect_notice_is_mirrored() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let (b, b_frontend) = spawn_node("teamB", true).await?;
    a.send_connect_request(b.local_address()).await?;

    a.disconnect_one(b.local_address()).await?;
    assert!(!a.registry().is_active(b.local_address()));

    let a_addr = a.local_address().clone();
    eventually("B to drop A", || !b.registry().is_active(&a_addr)).await?;
    assert!(b.list_peers().ever_seen.contains(&a_addr));
    assert_eq!(*b_frontend.departures.lock().unwrap(), vec![a_addr]);
    Ok(())
}

#[tokio::test]
async fn disconnect_all_notifies_every_active_peer() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let (b, b_frontend) = spawn_node("teamB", true).await?;
    let (c, c_frontend) = spawn_node("teamC", true).await?;
    a.send_connect_request(b.local_address()).await?;
    a.send_connect_request(c.local_address()).await?;

    let outcomes = a.disconnect_all().await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(a.registry().active_len(), 0);
    assert_eq!(a.registry().ever_seen_len(), 2);

    eventually("B and C to see the notice", || {
        b_frontend.departures.lock().unwrap().len() == 1
            && c_frontend.departures.lock().unwrap().len() == 1
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn reconnect_keeps_live_peers_and_prunes_dead_ones() -> Result<()> {
    let (a, _) = spawn_node("teamA", false).await?;
    let (b, b_frontend) = spawn_node("teamB", true).await?;
    let dead = dead_address().await?;

    a.send_connect_request(b.local_address()).await?;
    a.registry().add_peer(&dead);

    let outcomes = a.reconnect_active().await;

    assert_eq!(outcomes.len(), 2);
    for (peer, result) in &outcomes {
        if peer == &dead {
            assert!(result.as_ref().is_err_and(SessionError::is_unreachable));
        } else {
            assert!(result.is_ok(), "reconnect to {peer} failed: {result:?}");
        }
    }
    assert!(a.registry().is_active(b.local_address()));
    assert!(!a.registry().is_active(&dead));
    assert!(a.list_peers().ever_seen.contains(&dead));
    assert_eq!(b_frontend.requests.lock().unwrap().len(), 2);
    Ok(())
}
