use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::ChatStore;
use crate::{
    models::{
        ActiveMediaSession, AccessType, Channel, ChannelId, MediaKind, MediaSession, Message,
        MessageId, NewMessage, User, UserId,
    },
    Error, Result,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    channels: HashMap<ChannelId, Channel>,
    members: HashSet<(ChannelId, UserId)>,
    messages: Vec<Message>,
    media_sessions: HashMap<(ChannelId, UserId, MediaKind), MediaSession>,
}

/// In-process store for tests and runs without a database
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user and return it
    pub fn add_user(&self, username: &str) -> User {
        self.insert_user(User::new(username))
    }

    /// Insert a channel whose admin is its first member
    pub fn add_channel(&self, name: &str, admin_id: &UserId, access_type: AccessType) -> Channel {
        self.insert_channel(Channel::new(name, admin_id.clone(), access_type))
    }

    /// Insert a user as given, replacing any user with the same id
    pub fn insert_user(&self, user: User) -> User {
        self.tables.write().users.insert(user.id.clone(), user.clone());
        user
    }

    /// Insert a channel as given and make its admin a member
    pub fn insert_channel(&self, channel: Channel) -> Channel {
        let mut tables = self.tables.write();
        tables
            .members
            .insert((channel.id.clone(), channel.admin_id.clone()));
        tables.channels.insert(channel.id.clone(), channel.clone());
        channel
    }

    #[must_use]
    pub fn has_user(&self, user_id: &UserId) -> bool {
        self.tables.read().users.contains_key(user_id)
    }

    pub fn add_member(&self, channel_id: &ChannelId, user_id: &UserId) {
        self.tables
            .write()
            .members
            .insert((channel_id.clone(), user_id.clone()));
    }

    pub fn remove_member(&self, channel_id: &ChannelId, user_id: &UserId) {
        self.tables
            .write()
            .members
            .remove(&(channel_id.clone(), user_id.clone()));
    }

    /// Messages of a channel in insertion order
    #[must_use]
    pub fn messages(&self, channel_id: &ChannelId) -> Vec<Message> {
        self.tables
            .read()
            .messages
            .iter()
            .filter(|m| &m.channel_id == channel_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn media_sessions(&self, channel_id: &ChannelId) -> Vec<MediaSession> {
        self.tables
            .read()
            .media_sessions
            .values()
            .filter(|s| &s.channel_id == channel_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(user_id).cloned())
    }

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Option<Channel>> {
        Ok(self.tables.read().channels.get(channel_id).cloned())
    }

    async fn is_member(&self, channel_id: &ChannelId, user_id: &UserId) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .members
            .contains(&(channel_id.clone(), user_id.clone())))
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message> {
        let mut tables = self.tables.write();
        if !tables.channels.contains_key(&message.channel_id) {
            return Err(Error::ChannelNotFound(message.channel_id));
        }

        let message = message.into_message(MessageId::new(), Utc::now());
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn update_last_seen(&self, user_id: &UserId) -> Result<()> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| Error::UserNotFound(user_id.clone()))?;
        user.last_online = Utc::now();
        Ok(())
    }

    async fn upsert_media_session(
        &self,
        channel_id: &ChannelId,
        user_id: &UserId,
        media_type: MediaKind,
        is_active: bool,
    ) -> Result<MediaSession> {
        let mut tables = self.tables.write();
        let session = tables
            .media_sessions
            .entry((channel_id.clone(), user_id.clone(), media_type))
            .and_modify(|s| {
                s.is_active = is_active;
                s.updated_at = Utc::now();
            })
            .or_insert_with(|| {
                MediaSession::new(channel_id.clone(), user_id.clone(), media_type, is_active)
            });
        Ok(session.clone())
    }

    async fn list_active_media_sessions(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Vec<ActiveMediaSession>> {
        let tables = self.tables.read();
        let mut sessions: Vec<&MediaSession> = tables
            .media_sessions
            .values()
            .filter(|s| &s.channel_id == channel_id && s.is_active)
            .collect();
        sessions.sort_by_key(|s| s.updated_at);

        Ok(sessions
            .into_iter()
            .filter_map(|s| {
                let user = tables.users.get(&s.user_id)?;
                Some(ActiveMediaSession {
                    id: s.id.clone(),
                    media_type: s.media_type,
                    user: user.summary(),
                })
            })
            .collect())
    }
}
