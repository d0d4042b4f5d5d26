//! Registry behaviour through a running coordination loop

use huddle_core::models::{ChannelId, UserId, UserSummary};
use huddle_hub::{Exclude, Hub, HubHandle, HubKind, OutboundFrame, SessionHandle};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

static MARKERS: AtomicUsize = AtomicUsize::new(0);

fn session(channel: &str, user: &str) -> (SessionHandle, mpsc::Receiver<OutboundFrame>) {
    SessionHandle::new(
        ChannelId::from(channel),
        UserSummary::new(UserId::from(user), user),
        64,
    )
}

fn frame(text: &str) -> OutboundFrame {
    OutboundFrame::from(text.to_string())
}

/// Broadcast a unique marker and collect everything queued before it.
///
/// Markers left over from earlier flushes are skipped.
async fn flush(
    hub: &HubHandle,
    channel: &str,
    rx: &mut mpsc::Receiver<OutboundFrame>,
) -> Vec<Value> {
    let id = MARKERS.fetch_add(1, Ordering::Relaxed);
    hub.broadcast(
        ChannelId::from(channel),
        OutboundFrame::from(format!(r#"{{"type":"marker","id":{id}}}"#)),
        Exclude::Nobody,
    )
    .await
    .unwrap();

    let mut frames = Vec::new();
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("marker never arrived")
            .expect("queue closed");
        let value: Value = serde_json::from_str(frame.as_str()).unwrap();
        if value["type"] == "marker" {
            if value["id"] == id {
                return frames;
            }
            continue;
        }
        frames.push(value);
    }
}

#[tokio::test]
async fn test_unregistered_session_disappears_from_directory() {
    let hub = Hub::spawn(HubKind::Chat, 64);
    let (a, mut a_rx) = session("c1", "alice");
    let (b, _b_rx) = session("c1", "bob");
    let channel_id = a.channel_id.clone();

    hub.register(a.clone()).await.unwrap();
    hub.register(b.clone()).await.unwrap();
    hub.unregister(&b).await.unwrap();
    flush(&hub, "c1", &mut a_rx).await;

    let peers = hub.peers(&channel_id);
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].user_id, a.user.id);

    // A session elsewhere proves the loop has applied the unregister
    let (marker, mut marker_rx) = session("sync", "marker");
    hub.register(marker).await.unwrap();
    hub.unregister(&a).await.unwrap();
    flush(&hub, "sync", &mut marker_rx).await;

    assert!(!hub.directory().contains_channel(&channel_id));
    assert!(hub.peers(&channel_id).is_empty());
}

#[tokio::test]
async fn test_outbound_queue_closes_after_unregister() {
    let hub = Hub::spawn(HubKind::Chat, 64);
    let (a, mut a_rx) = session("c1", "alice");

    hub.register(a.clone()).await.unwrap();
    hub.unregister(&a).await.unwrap();
    drop(a);

    let mut frames = Vec::new();
    while let Some(frame) = tokio::time::timeout(Duration::from_secs(1), a_rx.recv())
        .await
        .unwrap()
    {
        frames.push(frame);
    }
    // Only the snapshot; the left event goes to the others
    assert_eq!(frames.len(), 1);
}

#[tokio::test]
async fn test_chat_presence_events() {
    let hub = Hub::spawn(HubKind::Chat, 64);
    let (a, mut a_rx) = session("c1", "alice");
    let (b, mut b_rx) = session("c1", "bob");

    hub.register(a).await.unwrap();
    hub.register(b.clone()).await.unwrap();

    let b_frames = flush(&hub, "c1", &mut b_rx).await;
    assert_eq!(b_frames.len(), 1);
    assert_eq!(b_frames[0]["type"], "existing-peers");
    assert_eq!(b_frames[0]["payload"]["peers"][0]["username"], "alice");

    hub.unregister(&b).await.unwrap();
    let a_frames = flush(&hub, "c1", &mut a_rx).await;
    let kinds: Vec<&str> = a_frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["existing-peers", "user_joined", "user_left"]);
    assert_eq!(a_frames[1]["user"]["username"], "bob");
    assert_eq!(a_frames[2]["user"]["id"], "bob");
}

#[tokio::test]
async fn test_broadcast_exclude_never_reaches_excluded() {
    let hub = Hub::spawn(HubKind::Chat, 64);
    let (a, mut a_rx) = session("c1", "alice");
    let (b, mut b_rx) = session("c1", "bob");
    let (c, mut c_rx) = session("c1", "carol");

    hub.register(a.clone()).await.unwrap();
    hub.register(b).await.unwrap();
    hub.register(c).await.unwrap();
    flush(&hub, "c1", &mut a_rx).await;
    flush(&hub, "c1", &mut b_rx).await;
    flush(&hub, "c1", &mut c_rx).await;

    hub.broadcast(
        a.channel_id.clone(),
        frame(r#"{"type":"typing"}"#),
        Exclude::Connection(a.connection_id.clone()),
    )
    .await
    .unwrap();

    assert!(flush(&hub, "c1", &mut a_rx).await.is_empty());
    assert_eq!(flush(&hub, "c1", &mut b_rx).await.len(), 1);
    assert_eq!(flush(&hub, "c1", &mut c_rx).await.len(), 1);
}

#[tokio::test]
async fn test_broadcasts_do_not_cross_channels() {
    let hub = Hub::spawn(HubKind::Chat, 64);
    let (a, mut a_rx) = session("c1", "alice");
    let (b, mut b_rx) = session("c2", "bob");

    hub.register(a.clone()).await.unwrap();
    hub.register(b).await.unwrap();
    flush(&hub, "c1", &mut a_rx).await;
    flush(&hub, "c2", &mut b_rx).await;

    hub.broadcast(
        a.channel_id.clone(),
        frame(r#"{"n":1}"#),
        Exclude::Nobody,
    )
    .await
    .unwrap();

    assert_eq!(flush(&hub, "c1", &mut a_rx).await.len(), 1);
    assert!(flush(&hub, "c2", &mut b_rx).await.is_empty());
}

#[tokio::test]
async fn test_per_recipient_order_is_submission_order() {
    let hub = Hub::spawn(HubKind::Chat, 64);
    let (a, mut a_rx) = session("c1", "alice");
    let (b, mut b_rx) = session("c1", "bob");

    hub.register(a.clone()).await.unwrap();
    hub.register(b.clone()).await.unwrap();
    flush(&hub, "c1", &mut a_rx).await;
    flush(&hub, "c1", &mut b_rx).await;

    for n in 0..20 {
        hub.broadcast(
            a.channel_id.clone(),
            OutboundFrame::from(format!(r#"{{"n":{n}}}"#)),
            Exclude::Nobody,
        )
        .await
        .unwrap();
        hub.send_to_peer(
            a.channel_id.clone(),
            b.user.id.clone(),
            OutboundFrame::from(format!(r#"{{"direct":{n}}}"#)),
        )
        .await
        .unwrap();
    }

    let a_seen: Vec<u64> = flush(&hub, "c1", &mut a_rx)
        .await
        .iter()
        .map(|f| f["n"].as_u64().unwrap())
        .collect();
    assert_eq!(a_seen, (0..20).collect::<Vec<_>>());

    let b_frames = flush(&hub, "c1", &mut b_rx).await;
    assert_eq!(b_frames.len(), 40);
    for (i, pair) in b_frames.chunks(2).enumerate() {
        assert_eq!(pair[0]["n"], i);
        assert_eq!(pair[1]["direct"], i);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_unregister_leaves_consistent_registry() {
    const CHANNELS: usize = 5;
    const SESSIONS: usize = 40;

    let hub = Hub::spawn(HubKind::Signaling, 256);
    let mut tasks = Vec::new();

    for i in 0..SESSIONS {
        let hub = hub.clone();
        tasks.push(tokio::spawn(async move {
            let channel = format!("c{}", i % CHANNELS);
            let (s, rx) = session(&channel, &format!("user{i}"));
            hub.register(s.clone()).await.unwrap();
            // Every other session leaves again
            if i % 2 == 0 {
                hub.unregister(&s).await.unwrap();
                None
            } else {
                Some((s, rx))
            }
        }));
    }

    let mut live = Vec::new();
    for task in tasks {
        if let Some(entry) = task.await.unwrap() {
            live.push(entry);
        }
    }

    // A marker per channel proves every command before it was applied
    for (s, rx) in &mut live {
        let channel = s.channel_id.as_str().to_string();
        flush(&hub, &channel, rx).await;
    }

    let directory = hub.directory();
    assert_eq!(directory.session_count(), live.len());

    let mut seen = HashSet::new();
    for channel in 0..CHANNELS {
        let peers = directory.peers(&ChannelId::from(format!("c{channel}")));
        if directory.contains_channel(&ChannelId::from(format!("c{channel}"))) {
            assert!(!peers.is_empty());
        }
        for peer in peers {
            assert!(seen.insert(peer.connection_id.clone()));
        }
    }
    for (s, _) in &live {
        assert!(seen.contains(&s.connection_id));
    }
}
