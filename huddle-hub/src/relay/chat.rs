use async_trait::async_trait;
use huddle_core::models::NewMessage;
use huddle_core::ChatStore;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{ensure_member, reply_error, Relay};
use crate::hub::{Exclude, HubHandle, InboundKind, InboundMessage, ServerEvent, SessionHandle};
use crate::Result;

const NOT_A_MEMBER: &str = "You must be a member to send messages in this channel";

/// Chat traffic: persisted messages and ephemeral typing indicators
pub struct ChatRelay {
    hub: HubHandle,
    store: Arc<dyn ChatStore>,
    max_message_length: usize,
}

impl ChatRelay {
    pub fn new(hub: HubHandle, store: Arc<dyn ChatStore>, max_message_length: usize) -> Self {
        Self {
            hub,
            store,
            max_message_length,
        }
    }

    async fn handle_message(&self, session: &SessionHandle, content: String) -> Result<()> {
        if !ensure_member(self.store.as_ref(), session, NOT_A_MEMBER).await {
            return Ok(());
        }

        if content.chars().count() > self.max_message_length {
            reply_error(
                session,
                &format!(
                    "Message must be less than {} characters",
                    self.max_message_length
                ),
            );
            return Ok(());
        }

        // Stored before fan-out so history never lags what clients saw
        let message = match self
            .store
            .create_message(NewMessage::new(
                session.channel_id.clone(),
                session.user.id.clone(),
                content,
            ))
            .await
        {
            Ok(message) => message,
            Err(e) => {
                error!(
                    channel_id = %session.channel_id,
                    user_id = %session.user.id,
                    error = %e,
                    "Failed to save message"
                );
                reply_error(session, "Failed to send message");
                return Ok(());
            }
        };

        if let Err(e) = self.store.update_last_seen(&session.user.id).await {
            warn!(user_id = %session.user.id, error = %e, "Failed to update last seen");
        }

        let event = ServerEvent::chat_message(&message, session.user.clone());
        match event.encode() {
            Ok(frame) => {
                self.hub
                    .broadcast(session.channel_id.clone(), frame, Exclude::Nobody)
                    .await
            }
            Err(e) => {
                error!(message_id = %message.id, error = %e, "Failed to encode chat message");
                Ok(())
            }
        }
    }

    async fn handle_typing(&self, session: &SessionHandle) -> Result<()> {
        if !ensure_member(self.store.as_ref(), session, NOT_A_MEMBER).await {
            return Ok(());
        }

        let frame = match ServerEvent::typing(session.channel_id.clone(), session.user.clone()).encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode typing indicator");
                return Ok(());
            }
        };
        self.hub
            .broadcast(
                session.channel_id.clone(),
                frame,
                Exclude::Connection(session.connection_id.clone()),
            )
            .await
    }
}

#[async_trait]
impl Relay for ChatRelay {
    fn hub(&self) -> &HubHandle {
        &self.hub
    }

    async fn handle(&self, session: &SessionHandle, message: InboundMessage) -> Result<()> {
        match message.kind {
            InboundKind::Message => match message.content {
                Some(content) if !content.is_empty() => self.handle_message(session, content).await,
                _ => Ok(()),
            },
            InboundKind::Typing => self.handle_typing(session).await,
            kind => {
                debug!(
                    connection_id = %session.connection_id,
                    kind = ?kind,
                    "Ignoring frame type not handled by chat"
                );
                Ok(())
            }
        }
    }
}
