use chrono::{DateTime, Utc};
use huddle_core::models::{ChannelId, ConnectionId, MediaKind, Message, MessageId, UserId, UserSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{Error, Result};

/// Client-supplied `type` of an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InboundKind {
    Message,
    Typing,
    Offer,
    Answer,
    IceCandidate,
    Join,
    Leave,
    MediaState,
}

/// Frame received from a client.
///
/// `channel_id` and `from` may be present on the wire but are never read;
/// the session supplies both.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: InboundKind,
    #[serde(default)]
    pub to: Option<UserId>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl InboundMessage {
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(Error::Decode)
    }
}

/// Payload of a `media-state` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MediaStatePayload {
    pub media_type: MediaKind,
    pub is_active: bool,
}

/// `type` of a frame sent to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEventKind {
    #[serde(rename = "message")]
    Message,
    #[serde(rename = "typing")]
    Typing,
    #[serde(rename = "user_joined")]
    UserJoined,
    #[serde(rename = "user_left")]
    UserLeft,
    #[serde(rename = "peer-joined")]
    PeerJoined,
    #[serde(rename = "peer-left")]
    PeerLeft,
    #[serde(rename = "existing-peers")]
    ExistingPeers,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "offer")]
    Offer,
    #[serde(rename = "answer")]
    Answer,
    #[serde(rename = "ice-candidate")]
    IceCandidate,
    #[serde(rename = "join")]
    Join,
    #[serde(rename = "leave")]
    Leave,
}

impl ServerEventKind {
    /// Outbound kind for relayed negotiation traffic
    #[must_use]
    pub const fn from_negotiation(kind: InboundKind) -> Option<Self> {
        match kind {
            InboundKind::Offer => Some(Self::Offer),
            InboundKind::Answer => Some(Self::Answer),
            InboundKind::IceCandidate => Some(Self::IceCandidate),
            InboundKind::Join => Some(Self::Join),
            InboundKind::Leave => Some(Self::Leave),
            InboundKind::Message | InboundKind::Typing | InboundKind::MediaState => None,
        }
    }
}

/// A live session as other peers see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub user_id: UserId,
    pub username: String,
    #[serde(skip)]
    pub connection_id: ConnectionId,
}

/// Envelope of every frame sent to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub kind: ServerEventKind,
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ServerEvent {
    fn new(kind: ServerEventKind, channel_id: ChannelId) -> Self {
        Self {
            kind,
            channel_id,
            from: None,
            to: None,
            user: None,
            message_id: None,
            content: None,
            payload: None,
            timestamp: Utc::now(),
        }
    }

    /// A persisted chat message, stamped with the storage timestamp
    #[must_use]
    pub fn chat_message(message: &Message, author: UserSummary) -> Self {
        Self {
            user: Some(author),
            message_id: Some(message.id.clone()),
            content: Some(message.content.clone()),
            timestamp: message.created_at,
            ..Self::new(ServerEventKind::Message, message.channel_id.clone())
        }
    }

    #[must_use]
    pub fn typing(channel_id: ChannelId, user: UserSummary) -> Self {
        Self {
            user: Some(user),
            ..Self::new(ServerEventKind::Typing, channel_id)
        }
    }

    /// In-band error reply to a single session
    pub fn error(channel_id: ChannelId, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::new(ServerEventKind::Error, channel_id)
        }
    }

    #[must_use]
    pub fn user_joined(channel_id: ChannelId, user: UserSummary) -> Self {
        Self {
            user: Some(user),
            ..Self::new(ServerEventKind::UserJoined, channel_id)
        }
    }

    #[must_use]
    pub fn user_left(channel_id: ChannelId, user: UserSummary) -> Self {
        Self {
            user: Some(user),
            ..Self::new(ServerEventKind::UserLeft, channel_id)
        }
    }

    #[must_use]
    pub fn peer_joined(channel_id: ChannelId, user: &UserSummary) -> Self {
        Self {
            from: Some(user.id.clone()),
            payload: Some(serde_json::json!({
                "user_id": user.id,
                "username": user.username,
            })),
            ..Self::new(ServerEventKind::PeerJoined, channel_id)
        }
    }

    #[must_use]
    pub fn peer_left(channel_id: ChannelId, user: &UserSummary) -> Self {
        Self {
            from: Some(user.id.clone()),
            payload: Some(serde_json::json!({ "user_id": user.id })),
            ..Self::new(ServerEventKind::PeerLeft, channel_id)
        }
    }

    /// Snapshot of the other sessions in a channel; `peers` is always an array
    #[must_use]
    pub fn existing_peers(channel_id: ChannelId, peers: &[PeerInfo]) -> Self {
        Self {
            payload: Some(serde_json::json!({ "peers": peers })),
            ..Self::new(ServerEventKind::ExistingPeers, channel_id)
        }
    }

    /// Negotiation frame stamped with the sender's true identity
    #[must_use]
    pub fn signal(
        kind: ServerEventKind,
        channel_id: ChannelId,
        from: UserId,
        to: Option<UserId>,
        payload: Option<Value>,
    ) -> Self {
        Self {
            from: Some(from),
            to,
            payload,
            ..Self::new(kind, channel_id)
        }
    }

    /// Serialize once for every recipient
    pub fn encode(&self) -> Result<OutboundFrame> {
        serde_json::to_string(self)
            .map(OutboundFrame::from)
            .map_err(Error::Encode)
    }
}

/// A serialized frame queued on session outbound queues; cloning shares the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame(Arc<str>);

impl OutboundFrame {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OutboundFrame {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

/// Which sessions a broadcast skips
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Exclude {
    #[default]
    Nobody,
    /// One session, e.g. the sender of a typing indicator
    Connection(ConnectionId),
    /// Every session of one user, e.g. the sender of a signal
    User(UserId),
}

impl Exclude {
    #[must_use]
    pub fn skips(&self, connection_id: &ConnectionId, user_id: &UserId) -> bool {
        match self {
            Self::Nobody => false,
            Self::Connection(id) => id == connection_id,
            Self::User(id) => id == user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_client_identity() {
        let msg = InboundMessage::decode(
            r#"{"type":"ice-candidate","channel_id":"spoofed","from":"mallory","to":"bob","payload":{"candidate":"x"}}"#,
        )
        .unwrap();

        assert_eq!(msg.kind, InboundKind::IceCandidate);
        assert_eq!(msg.to, Some(UserId::from("bob")));
        assert_eq!(msg.payload.unwrap()["candidate"], "x");
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        assert!(matches!(
            InboundMessage::decode(r#"{"type":"shout"}"#),
            Err(Error::Decode(_))
        ));
        assert!(InboundMessage::decode("not json").is_err());
    }

    #[test]
    fn test_existing_peers_is_an_empty_array_when_alone() {
        let frame = ServerEvent::existing_peers(ChannelId::from("c1"), &[])
            .encode()
            .unwrap();
        let value: Value = serde_json::from_str(frame.as_str()).unwrap();

        assert_eq!(value["type"], "existing-peers");
        assert_eq!(value["payload"]["peers"], serde_json::json!([]));
    }

    #[test]
    fn test_peer_info_hides_connection_id() {
        let peer = PeerInfo {
            user_id: UserId::from("u1"),
            username: "alice".to_string(),
            connection_id: ConnectionId::from("conn"),
        };
        let value = serde_json::to_value(&peer).unwrap();

        assert_eq!(value, serde_json::json!({"user_id": "u1", "username": "alice"}));
    }

    #[test]
    fn test_error_frame_shape() {
        let frame = ServerEvent::error(ChannelId::from("c1"), "nope").encode().unwrap();
        let value: Value = serde_json::from_str(frame.as_str()).unwrap();

        assert_eq!(value["type"], "error");
        assert_eq!(value["content"], "nope");
        assert!(value.get("user").is_none());
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn test_exclude_skips() {
        let conn = ConnectionId::from("c");
        let user = UserId::from("u");

        assert!(!Exclude::Nobody.skips(&conn, &user));
        assert!(Exclude::Connection(conn.clone()).skips(&conn, &user));
        assert!(!Exclude::Connection(ConnectionId::from("other")).skips(&conn, &user));
        assert!(Exclude::User(user.clone()).skips(&conn, &user));
    }
}
