use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::{ChannelId, MediaSessionId, UserId};
use super::user::UserSummary;

/// Kind of media a user publishes in a voice/video call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Screen,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Screen => "screen",
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "screen" => Ok(Self::Screen),
            _ => Err(format!("Unknown media type: {s}")),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted media state of one user in one channel, one row per kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSession {
    pub id: MediaSessionId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub media_type: MediaKind,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaSession {
    #[must_use]
    pub fn new(channel_id: ChannelId, user_id: UserId, media_type: MediaKind, is_active: bool) -> Self {
        let now = Utc::now();
        Self {
            id: MediaSessionId::new(),
            channel_id,
            user_id,
            media_type,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Active media session joined with its user, as listed over HTTP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveMediaSession {
    pub id: MediaSessionId,
    pub media_type: MediaKind,
    pub user: UserSummary,
}
