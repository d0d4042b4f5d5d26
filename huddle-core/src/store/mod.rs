//! Persistence seam used by the realtime relays and the HTTP handlers
//!
//! [`PgStore`] backs a production deployment, [`MemoryStore`] keeps
//! everything in process for tests and database-less runs.

mod memory;
mod pg;

use async_trait::async_trait;

use crate::{
    models::{
        ActiveMediaSession, Channel, ChannelId, MediaKind, MediaSession, Message, NewMessage,
        User, UserId,
    },
    Result,
};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Storage operations the realtime layer depends on
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Option<Channel>>;

    async fn is_member(&self, channel_id: &ChannelId, user_id: &UserId) -> Result<bool>;

    /// Persist a chat message and return it with its assigned ID
    async fn create_message(&self, message: NewMessage) -> Result<Message>;

    /// Stamp the user's last-seen time
    async fn update_last_seen(&self, user_id: &UserId) -> Result<()>;

    /// Insert or update the media session for (channel, user, kind)
    async fn upsert_media_session(
        &self,
        channel_id: &ChannelId,
        user_id: &UserId,
        media_type: MediaKind,
        is_active: bool,
    ) -> Result<MediaSession>;

    async fn list_active_media_sessions(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Vec<ActiveMediaSession>>;
}
