use async_trait::async_trait;
use huddle_core::metrics::INBOUND_DECODE_ERRORS;
use huddle_core::ChatStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{ensure_member, Relay};
use crate::hub::{
    Exclude, HubHandle, InboundKind, InboundMessage, MediaStatePayload, ServerEvent,
    ServerEventKind, SessionHandle,
};
use crate::Result;

const NOT_A_MEMBER: &str = "You must be a member to join voice/video";

/// Voice/video negotiation relay.
///
/// Offers, answers, ICE candidates and join/leave notices are passed
/// through untouched, either to one peer (`to`) or to every other user in
/// the channel. `media-state` is persisted and never forwarded.
pub struct SignalingRelay {
    hub: HubHandle,
    store: Arc<dyn ChatStore>,
}

impl SignalingRelay {
    pub fn new(hub: HubHandle, store: Arc<dyn ChatStore>) -> Self {
        Self { hub, store }
    }

    async fn record_media_state(&self, session: &SessionHandle, payload: Option<Value>) {
        let state = match payload
            .map(serde_json::from_value::<MediaStatePayload>)
            .transpose()
        {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(connection_id = %session.connection_id, "media-state without payload");
                return;
            }
            Err(e) => {
                INBOUND_DECODE_ERRORS
                    .with_label_values(&[self.hub.kind().as_str()])
                    .inc();
                warn!(
                    connection_id = %session.connection_id,
                    error = %e,
                    "Malformed media-state payload"
                );
                return;
            }
        };

        if let Err(e) = self
            .store
            .upsert_media_session(
                &session.channel_id,
                &session.user.id,
                state.media_type,
                state.is_active,
            )
            .await
        {
            error!(
                channel_id = %session.channel_id,
                user_id = %session.user.id,
                media_type = %state.media_type,
                error = %e,
                "Failed to record media state"
            );
        }
    }

    async fn relay_signal(
        &self,
        session: &SessionHandle,
        kind: ServerEventKind,
        message: InboundMessage,
    ) -> Result<()> {
        let event = ServerEvent::signal(
            kind,
            session.channel_id.clone(),
            session.user.id.clone(),
            message.to.clone(),
            message.payload,
        );
        let frame = match event.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode signal");
                return Ok(());
            }
        };

        match message.to {
            Some(recipient) => {
                self.hub
                    .send_to_peer(session.channel_id.clone(), recipient, frame)
                    .await
            }
            None => {
                self.hub
                    .broadcast(
                        session.channel_id.clone(),
                        frame,
                        Exclude::User(session.user.id.clone()),
                    )
                    .await
            }
        }
    }
}

#[async_trait]
impl Relay for SignalingRelay {
    fn hub(&self) -> &HubHandle {
        &self.hub
    }

    async fn handle(&self, session: &SessionHandle, message: InboundMessage) -> Result<()> {
        if !ensure_member(self.store.as_ref(), session, NOT_A_MEMBER).await {
            return Ok(());
        }

        debug!(
            channel_id = %session.channel_id,
            user_id = %session.user.id,
            kind = ?message.kind,
            to = ?message.to,
            "Signal received"
        );

        if message.kind == InboundKind::MediaState {
            self.record_media_state(session, message.payload).await;
            return Ok(());
        }

        match ServerEventKind::from_negotiation(message.kind) {
            Some(kind) => self.relay_signal(session, kind, message).await,
            None => {
                debug!(
                    connection_id = %session.connection_id,
                    kind = ?message.kind,
                    "Ignoring frame type not handled by signaling"
                );
                Ok(())
            }
        }
    }
}
