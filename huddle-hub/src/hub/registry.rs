use huddle_core::metrics::{self, FRAMES_DELIVERED, FRAMES_DROPPED, SESSIONS_ACTIVE};
use huddle_core::models::{ChannelId, ConnectionId, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events::{Exclude, OutboundFrame, PeerInfo, ServerEvent};
use super::session::{Delivery, SessionHandle};
use crate::{Error, Result};

/// Which realtime surface a hub serves; decides the presence events it emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HubKind {
    Chat,
    Signaling,
}

impl HubKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Signaling => "signaling",
        }
    }

    fn joined_event(self, session: &SessionHandle) -> ServerEvent {
        match self {
            Self::Chat => ServerEvent::user_joined(session.channel_id.clone(), session.user.clone()),
            Self::Signaling => ServerEvent::peer_joined(session.channel_id.clone(), &session.user),
        }
    }

    fn left_event(self, session: &SessionHandle) -> ServerEvent {
        match self {
            Self::Chat => ServerEvent::user_left(session.channel_id.clone(), session.user.clone()),
            Self::Signaling => ServerEvent::peer_left(session.channel_id.clone(), &session.user),
        }
    }
}

impl std::fmt::Display for HubKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-guarded copy of channel membership for readers outside the loop.
///
/// Only the coordination loop writes it.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    channels: Arc<RwLock<HashMap<ChannelId, Vec<PeerInfo>>>>,
}

impl PeerDirectory {
    /// Live sessions of a channel; empty if nobody is connected
    #[must_use]
    pub fn peers(&self, channel_id: &ChannelId) -> Vec<PeerInfo> {
        self.channels
            .read()
            .get(channel_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains_channel(&self, channel_id: &ChannelId) -> bool {
        self.channels.read().contains_key(channel_id)
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.channels.read().values().map(Vec::len).sum()
    }

    fn publish(&self, channel_id: &ChannelId, sessions: Option<&HashMap<ConnectionId, SessionHandle>>) {
        let mut channels = self.channels.write();
        match sessions {
            Some(sessions) => {
                channels.insert(
                    channel_id.clone(),
                    sessions.values().map(SessionHandle::peer_info).collect(),
                );
            }
            None => {
                channels.remove(channel_id);
            }
        }
    }
}

enum HubCommand {
    Register(SessionHandle),
    Unregister {
        channel_id: ChannelId,
        connection_id: ConnectionId,
    },
    Broadcast {
        channel_id: ChannelId,
        frame: OutboundFrame,
        exclude: Exclude,
    },
    SendToPeer {
        channel_id: ChannelId,
        recipient: UserId,
        frame: OutboundFrame,
    },
}

/// Channel registry and its coordination loop.
///
/// The session map is owned by [`Hub::run`] and never shared; every
/// operation arrives as a command on one ordered queue, so per-recipient
/// delivery order equals submission order.
pub struct Hub {
    kind: HubKind,
    channels: HashMap<ChannelId, HashMap<ConnectionId, SessionHandle>>,
    commands: mpsc::Receiver<HubCommand>,
    directory: PeerDirectory,
}

impl Hub {
    /// Create a hub and the handle that feeds it
    #[must_use]
    pub fn new(kind: HubKind, command_buffer: usize) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(command_buffer);
        let directory = PeerDirectory::default();
        metrics::init_hub_series(kind.as_str());

        let hub = Self {
            kind,
            channels: HashMap::new(),
            commands: rx,
            directory: directory.clone(),
        };
        let handle = HubHandle {
            kind,
            commands: tx,
            directory,
        };
        (hub, handle)
    }

    /// Create a hub and run its loop on a new task
    #[must_use]
    pub fn spawn(kind: HubKind, command_buffer: usize) -> HubHandle {
        let (hub, handle) = Self::new(kind, command_buffer);
        tokio::spawn(hub.run());
        handle
    }

    /// Run until every [`HubHandle`] is dropped
    pub async fn run(mut self) {
        info!(hub = %self.kind, "Hub started");

        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register(session) => self.register(session),
                HubCommand::Unregister {
                    channel_id,
                    connection_id,
                } => self.unregister(&channel_id, &connection_id),
                HubCommand::Broadcast {
                    channel_id,
                    frame,
                    exclude,
                } => {
                    self.broadcast(&channel_id, &frame, &exclude);
                }
                HubCommand::SendToPeer {
                    channel_id,
                    recipient,
                    frame,
                } => {
                    self.send_to_peer(&channel_id, &recipient, &frame);
                }
            }
        }

        info!(hub = %self.kind, "Hub stopped");
    }

    fn register(&mut self, session: SessionHandle) {
        let channel_id = session.channel_id.clone();
        let sessions = self.channels.entry(channel_id.clone()).or_default();

        let peers: Vec<PeerInfo> = sessions.values().map(SessionHandle::peer_info).collect();
        sessions.insert(session.connection_id.clone(), session.clone());
        self.directory.publish(&channel_id, Some(sessions));
        SESSIONS_ACTIVE.with_label_values(&[self.kind.as_str()]).inc();

        info!(
            hub = %self.kind,
            channel_id = %channel_id,
            user_id = %session.user.id,
            connection_id = %session.connection_id,
            existing_peers = peers.len(),
            "Session registered"
        );

        if let Some(frame) = self.encode(&ServerEvent::existing_peers(channel_id.clone(), &peers)) {
            self.deliver(&session, &frame);
        }
        if let Some(frame) = self.encode(&self.kind.joined_event(&session)) {
            self.broadcast(
                &channel_id,
                &frame,
                &Exclude::Connection(session.connection_id.clone()),
            );
        }
    }

    fn unregister(&mut self, channel_id: &ChannelId, connection_id: &ConnectionId) {
        let Some(sessions) = self.channels.get_mut(channel_id) else {
            debug!(hub = %self.kind, connection_id = %connection_id, "Unregister of unknown session");
            return;
        };
        // Dropping the registry's handle lets the outbound queue close
        let Some(session) = sessions.remove(connection_id) else {
            debug!(hub = %self.kind, connection_id = %connection_id, "Unregister of unknown session");
            return;
        };

        if sessions.is_empty() {
            self.channels.remove(channel_id);
            self.directory.publish(channel_id, None);
            debug!(hub = %self.kind, channel_id = %channel_id, "Channel has no more sessions, removed");
        } else {
            self.directory.publish(channel_id, Some(sessions));
        }
        SESSIONS_ACTIVE.with_label_values(&[self.kind.as_str()]).dec();

        info!(
            hub = %self.kind,
            channel_id = %channel_id,
            user_id = %session.user.id,
            connection_id = %connection_id,
            "Session unregistered"
        );

        if let Some(frame) = self.encode(&self.kind.left_event(&session)) {
            self.broadcast(channel_id, &frame, &Exclude::Nobody);
        }
    }

    fn broadcast(&self, channel_id: &ChannelId, frame: &OutboundFrame, exclude: &Exclude) -> usize {
        let Some(sessions) = self.channels.get(channel_id) else {
            return 0;
        };

        sessions
            .values()
            .filter(|s| !exclude.skips(&s.connection_id, &s.user.id))
            .filter(|s| self.deliver(s, frame))
            .count()
    }

    fn send_to_peer(&self, channel_id: &ChannelId, recipient: &UserId, frame: &OutboundFrame) -> bool {
        let target = self
            .channels
            .get(channel_id)
            .and_then(|sessions| sessions.values().find(|s| &s.user.id == recipient));

        match target {
            Some(session) => self.deliver(session, frame),
            None => {
                debug!(
                    hub = %self.kind,
                    channel_id = %channel_id,
                    recipient = %recipient,
                    "Recipient not connected, frame discarded"
                );
                false
            }
        }
    }

    fn deliver(&self, session: &SessionHandle, frame: &OutboundFrame) -> bool {
        match session.try_deliver(frame) {
            Delivery::Queued => {
                FRAMES_DELIVERED.with_label_values(&[self.kind.as_str()]).inc();
                true
            }
            Delivery::Full => {
                FRAMES_DROPPED.with_label_values(&[self.kind.as_str()]).inc();
                warn!(
                    hub = %self.kind,
                    channel_id = %session.channel_id,
                    user_id = %session.user.id,
                    connection_id = %session.connection_id,
                    "Outbound queue full, frame dropped"
                );
                false
            }
            // Outbound pump already exited; the inbound pump unregisters
            Delivery::Closed => false,
        }
    }

    fn encode(&self, event: &ServerEvent) -> Option<OutboundFrame> {
        match event.encode() {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(hub = %self.kind, error = %e, "Failed to encode presence event");
                None
            }
        }
    }
}

/// Cloneable entry point to a running [`Hub`]
#[derive(Debug, Clone)]
pub struct HubHandle {
    kind: HubKind,
    commands: mpsc::Sender<HubCommand>,
    directory: PeerDirectory,
}

impl HubHandle {
    #[must_use]
    pub const fn kind(&self) -> HubKind {
        self.kind
    }

    #[must_use]
    pub const fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    /// Add a session to its channel; it receives the existing-peers snapshot
    /// and everyone else a joined event
    pub async fn register(&self, session: SessionHandle) -> Result<()> {
        self.submit(HubCommand::Register(session)).await
    }

    /// Remove a session; unknown sessions are ignored
    pub async fn unregister(&self, session: &SessionHandle) -> Result<()> {
        self.submit(HubCommand::Unregister {
            channel_id: session.channel_id.clone(),
            connection_id: session.connection_id.clone(),
        })
        .await
    }

    /// Fan a frame out to a channel, dropping it for any full queue
    pub async fn broadcast(
        &self,
        channel_id: ChannelId,
        frame: OutboundFrame,
        exclude: Exclude,
    ) -> Result<()> {
        self.submit(HubCommand::Broadcast {
            channel_id,
            frame,
            exclude,
        })
        .await
    }

    /// Deliver to the first session of `recipient` in the channel, if any
    pub async fn send_to_peer(
        &self,
        channel_id: ChannelId,
        recipient: UserId,
        frame: OutboundFrame,
    ) -> Result<()> {
        self.submit(HubCommand::SendToPeer {
            channel_id,
            recipient,
            frame,
        })
        .await
    }

    #[must_use]
    pub fn peers(&self, channel_id: &ChannelId) -> Vec<PeerInfo> {
        self.directory.peers(channel_id)
    }

    async fn submit(&self, command: HubCommand) -> Result<()> {
        self.commands.send(command).await.map_err(|_| Error::HubClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::models::UserSummary;
    use serde_json::Value;

    fn session(channel: &str, user: &str, capacity: usize) -> (SessionHandle, mpsc::Receiver<OutboundFrame>) {
        SessionHandle::new(
            ChannelId::from(channel),
            UserSummary::new(UserId::from(user), user),
            capacity,
        )
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundFrame>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(frame.as_str()).unwrap());
        }
        frames
    }

    fn frame(text: &str) -> OutboundFrame {
        OutboundFrame::from(text.to_string())
    }

    #[test]
    fn test_register_sends_snapshot_and_joined() {
        let (mut hub, _handle) = Hub::new(HubKind::Signaling, 16);
        let (a, mut a_rx) = session("c1", "alice", 16);
        let (b, mut b_rx) = session("c1", "bob", 16);

        hub.register(a);
        hub.register(b);

        let a_frames = drain(&mut a_rx);
        assert_eq!(a_frames.len(), 2);
        assert_eq!(a_frames[0]["type"], "existing-peers");
        assert_eq!(a_frames[0]["payload"]["peers"], serde_json::json!([]));
        assert_eq!(a_frames[1]["type"], "peer-joined");
        assert_eq!(a_frames[1]["from"], "bob");
        assert_eq!(a_frames[1]["payload"]["username"], "bob");

        let b_frames = drain(&mut b_rx);
        assert_eq!(b_frames.len(), 1);
        assert_eq!(b_frames[0]["type"], "existing-peers");
        assert_eq!(
            b_frames[0]["payload"]["peers"],
            serde_json::json!([{"user_id": "alice", "username": "alice"}])
        );
    }

    #[test]
    fn test_unregister_last_session_removes_channel() {
        let (mut hub, handle) = Hub::new(HubKind::Chat, 16);
        let (a, _a_rx) = session("c1", "alice", 16);
        let channel_id = a.channel_id.clone();
        let connection_id = a.connection_id.clone();

        hub.register(a);
        assert_eq!(handle.peers(&channel_id).len(), 1);

        hub.unregister(&channel_id, &connection_id);
        assert!(!hub.channels.contains_key(&channel_id));
        assert!(!handle.directory().contains_channel(&channel_id));
    }

    #[test]
    fn test_unregister_closes_queue_and_notifies_rest() {
        let (mut hub, _handle) = Hub::new(HubKind::Chat, 16);
        let (a, mut a_rx) = session("c1", "alice", 16);
        let (b, mut b_rx) = session("c1", "bob", 16);
        let b_channel = b.channel_id.clone();
        let b_conn = b.connection_id.clone();

        hub.register(a);
        hub.register(b);
        drain(&mut a_rx);
        drain(&mut b_rx);

        hub.unregister(&b_channel, &b_conn);

        // The registry held the only sender
        assert!(matches!(
            b_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        let a_frames = drain(&mut a_rx);
        assert_eq!(a_frames.len(), 1);
        assert_eq!(a_frames[0]["type"], "user_left");
        assert_eq!(a_frames[0]["user"]["id"], "bob");
    }

    #[test]
    fn test_double_unregister_is_noop() {
        let (mut hub, _handle) = Hub::new(HubKind::Chat, 16);
        let (a, mut a_rx) = session("c1", "alice", 16);
        let (b, _b_rx) = session("c1", "bob", 16);
        let b_channel = b.channel_id.clone();
        let b_conn = b.connection_id.clone();

        hub.register(a);
        hub.register(b);
        hub.unregister(&b_channel, &b_conn);
        drain(&mut a_rx);

        hub.unregister(&b_channel, &b_conn);
        assert!(drain(&mut a_rx).is_empty());
        assert_eq!(hub.channels[&b_channel].len(), 1);
    }

    #[test]
    fn test_broadcast_drops_only_for_full_queue() {
        let (mut hub, _handle) = Hub::new(HubKind::Chat, 16);
        let (slow, mut slow_rx) = session("c1", "slow", 1);
        let (fast, mut fast_rx) = session("c1", "fast", 16);
        let channel_id = fast.channel_id.clone();

        hub.register(slow);
        hub.register(fast);
        // slow's single slot holds its snapshot; the joined event was dropped
        let delivered = hub.broadcast(&channel_id, &frame(r#"{"n":1}"#), &Exclude::Nobody);

        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut slow_rx).len(), 1);
        let fast_frames = drain(&mut fast_rx);
        assert_eq!(fast_frames.last().unwrap()["n"], 1);
    }

    #[test]
    fn test_send_to_absent_peer_is_noop() {
        let (mut hub, _handle) = Hub::new(HubKind::Signaling, 16);
        let (a, mut a_rx) = session("c1", "alice", 16);
        let channel_id = a.channel_id.clone();
        hub.register(a);
        drain(&mut a_rx);

        assert!(!hub.send_to_peer(&channel_id, &UserId::from("ghost"), &frame("{}")));
        assert!(!hub.send_to_peer(&ChannelId::from("elsewhere"), &UserId::from("alice"), &frame("{}")));
        assert!(drain(&mut a_rx).is_empty());
    }

    #[test]
    fn test_send_to_peer_hits_first_session_only() {
        let (mut hub, _handle) = Hub::new(HubKind::Signaling, 16);
        let (a1, mut a1_rx) = session("c1", "alice", 16);
        let (a2, mut a2_rx) = session("c1", "alice", 16);
        let channel_id = a1.channel_id.clone();
        hub.register(a1);
        hub.register(a2);
        drain(&mut a1_rx);
        drain(&mut a2_rx);

        assert!(hub.send_to_peer(&channel_id, &UserId::from("alice"), &frame(r#"{"x":1}"#)));
        assert_eq!(drain(&mut a1_rx).len() + drain(&mut a2_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_handle_reports_closed_hub() {
        let (hub, handle) = Hub::new(HubKind::Chat, 1);
        drop(hub);

        let (a, _rx) = session("c1", "alice", 1);
        assert!(matches!(handle.register(a).await, Err(Error::HubClosed)));
    }
}
