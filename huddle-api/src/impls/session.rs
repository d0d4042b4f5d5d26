//! Lifetime of one upgraded connection

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, Stream, StreamExt};
use huddle_core::config::RealtimeConfig;
use huddle_core::models::{ChannelId, UserSummary};
use huddle_hub::{Relay, SessionHandle};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::pump::{run_inbound, run_outbound};

/// Serve an upgraded socket until either side goes away
pub async fn run_session(
    socket: WebSocket,
    relay: Arc<dyn Relay>,
    channel_id: ChannelId,
    user: UserSummary,
    config: RealtimeConfig,
) {
    let (sink, stream) = socket.split();
    drive_session(stream, sink, relay, channel_id, user, &config).await;
}

/// Register a session, run both pumps and wait for them to finish.
///
/// The outbound pump runs on its own task; the inbound pump runs here and
/// performs the single unregister.
pub async fn drive_session<St, Si, E>(
    stream: St,
    sink: Si,
    relay: Arc<dyn Relay>,
    channel_id: ChannelId,
    user: UserSummary,
    config: &RealtimeConfig,
) where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display,
{
    let hub = relay.hub().clone();
    let (session, outbound) =
        SessionHandle::new(channel_id, user, config.outbound_queue_capacity);
    let connection_id = session.connection_id.clone();

    info!(
        hub = %hub.kind(),
        channel_id = %session.channel_id,
        user_id = %session.user.id,
        connection_id = %connection_id,
        "WebSocket connection established"
    );

    if let Err(e) = hub.register(session.clone()).await {
        error!(connection_id = %connection_id, error = %e, "Hub unavailable, dropping connection");
        return;
    }

    let writer = tokio::spawn(run_outbound(
        sink,
        outbound,
        config.ping_interval(),
        config.write_wait(),
    ));
    let exit = run_inbound(stream, session, relay, config.pong_wait()).await;

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(connection_id = %connection_id, error = %e, "Outbound pump stopped"),
        Err(e) => error!(connection_id = %connection_id, error = %e, "Outbound pump panicked"),
    }

    info!(
        hub = %hub.kind(),
        connection_id = %connection_id,
        reason = ?exit,
        "WebSocket connection closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as client;
    use huddle_core::models::AccessType;
    use huddle_core::{ChatStore, MemoryStore};
    use huddle_hub::{Hub, HubKind, OutboundFrame, SignalingRelay};
    use serde_json::Value;
    use std::convert::Infallible;
    use tokio::sync::mpsc;

    async fn next_frame(rx: &mut mpsc::Receiver<OutboundFrame>) -> Value {
        let frame = rx.recv().await.expect("queue closed");
        serde_json::from_str(frame.as_str()).unwrap()
    }

    #[tokio::test]
    async fn test_session_teardown_runs_once_and_closes_socket() {
        let store = Arc::new(MemoryStore::new());
        let alice = store.add_user("alice");
        let bob = store.add_user("bob");
        let channel = store.add_channel("standup", &alice.id, AccessType::Public);
        store.add_member(&channel.id, &bob.id);
        let store: Arc<dyn ChatStore> = store;

        let hub = Hub::spawn(HubKind::Signaling, 64);
        let relay: Arc<dyn Relay> = Arc::new(SignalingRelay::new(hub.clone(), store));

        let (observer, mut observer_rx) = SessionHandle::new(channel.id.clone(), bob.summary(), 64);
        hub.register(observer).await.unwrap();
        assert_eq!(next_frame(&mut observer_rx).await["type"], "existing-peers");

        let (client_tx, stream) = client::unbounded::<Result<Message, Infallible>>();
        let (sink, sent) = client::channel::<Message>(16);
        let config = RealtimeConfig::default();
        let task = tokio::spawn({
            let relay = relay.clone();
            let channel_id = channel.id.clone();
            let user = alice.summary();
            async move { drive_session(stream, sink, relay, channel_id, user, &config).await }
        });

        let joined = next_frame(&mut observer_rx).await;
        assert_eq!(joined["type"], "peer-joined");
        assert_eq!(joined["from"], alice.id.as_str());

        // Client hangs up
        drop(client_tx);
        task.await.unwrap();

        let left = next_frame(&mut observer_rx).await;
        assert_eq!(left["type"], "peer-left");
        assert_eq!(left["payload"]["user_id"], alice.id.as_str());

        let peers = hub.peers(&channel.id);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].user_id, bob.id);

        // Snapshot first, close frame last
        let sent: Vec<Message> = sent.collect().await;
        assert!(matches!(sent.first(), Some(Message::Text(_))));
        assert!(matches!(sent.last(), Some(Message::Close(None))));

        // Nothing further for the observer: a single peer-left
        hub.broadcast(
            channel.id.clone(),
            OutboundFrame::from(r#"{"type":"marker"}"#.to_string()),
            huddle_hub::Exclude::Nobody,
        )
        .await
        .unwrap();
        assert_eq!(next_frame(&mut observer_rx).await["type"], "marker");
    }
}
