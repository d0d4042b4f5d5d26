use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ChannelId, MessageId, UserId};

/// A persisted chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub content: String,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
}

/// A chat message about to be persisted; storage assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub content: String,
}

impl NewMessage {
    pub fn new(channel_id: ChannelId, user_id: UserId, content: impl Into<String>) -> Self {
        Self {
            channel_id,
            user_id,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn into_message(self, id: MessageId, created_at: DateTime<Utc>) -> Message {
        Message {
            id,
            channel_id: self.channel_id,
            user_id: self.user_id,
            content: self.content,
            is_pinned: false,
            created_at,
        }
    }
}
