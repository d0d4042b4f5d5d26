use async_trait::async_trait;
use sqlx::PgPool;

use super::ChatStore;
use crate::{
    models::{
        ActiveMediaSession, Channel, ChannelId, MediaKind, MediaSession, Message, NewMessage,
        User, UserId,
    },
    repository::{ChannelRepository, MediaSessionRepository, MessageRepository, UserRepository},
    Error, Result,
};

/// Postgres-backed store built from the per-table repositories
#[derive(Clone)]
pub struct PgStore {
    users: UserRepository,
    channels: ChannelRepository,
    messages: MessageRepository,
    media_sessions: MediaSessionRepository,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            channels: ChannelRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            media_sessions: MediaSessionRepository::new(pool),
        }
    }

    #[must_use]
    pub const fn users(&self) -> &UserRepository {
        &self.users
    }

    #[must_use]
    pub const fn channels(&self) -> &ChannelRepository {
        &self.channels
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.users.get_by_id(user_id).await
    }

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Option<Channel>> {
        self.channels.get_by_id(channel_id).await
    }

    async fn is_member(&self, channel_id: &ChannelId, user_id: &UserId) -> Result<bool> {
        self.channels.is_member(channel_id, user_id).await
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message> {
        self.messages.create(&message).await
    }

    async fn update_last_seen(&self, user_id: &UserId) -> Result<()> {
        if self.users.update_last_seen(user_id).await? {
            Ok(())
        } else {
            Err(Error::UserNotFound(user_id.clone()))
        }
    }

    async fn upsert_media_session(
        &self,
        channel_id: &ChannelId,
        user_id: &UserId,
        media_type: MediaKind,
        is_active: bool,
    ) -> Result<MediaSession> {
        self.media_sessions
            .upsert(channel_id, user_id, media_type, is_active)
            .await
    }

    async fn list_active_media_sessions(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Vec<ActiveMediaSession>> {
        self.media_sessions.list_active(channel_id).await
    }
}
