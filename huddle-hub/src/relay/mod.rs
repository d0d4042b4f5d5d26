//! Per-message handling layered on a hub
//!
//! The inbound pump decodes a frame and hands it to a [`Relay`]. Relays
//! apply storage side effects, answer local errors straight onto the
//! sender's queue, and submit everything else to their hub.

mod chat;
mod signaling;

use async_trait::async_trait;
use huddle_core::ChatStore;
use tracing::{debug, warn};

use crate::hub::{Delivery, HubHandle, InboundMessage, ServerEvent, SessionHandle};
use crate::Result;

pub use chat::ChatRelay;
pub use signaling::SignalingRelay;

#[async_trait]
pub trait Relay: Send + Sync {
    fn hub(&self) -> &HubHandle;

    /// Handle one decoded frame from `session`.
    ///
    /// Only fails when the hub has stopped; everything else is answered
    /// in-band or logged.
    async fn handle(&self, session: &SessionHandle, message: InboundMessage) -> Result<()>;
}

/// Queue an `error` frame for the sender only
pub(crate) fn reply_error(session: &SessionHandle, content: &str) {
    let frame = match ServerEvent::error(session.channel_id.clone(), content).encode() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Failed to encode error frame");
            return;
        }
    };

    if session.try_deliver(&frame) != Delivery::Queued {
        debug!(
            connection_id = %session.connection_id,
            "Error reply dropped, outbound queue unavailable"
        );
    }
}

/// Re-check channel membership for one message, replying with `denial`
/// when the sender is not a member
pub(crate) async fn ensure_member(
    store: &dyn ChatStore,
    session: &SessionHandle,
    denial: &str,
) -> bool {
    match store.is_member(&session.channel_id, &session.user.id).await {
        Ok(true) => true,
        Ok(false) => {
            debug!(
                channel_id = %session.channel_id,
                user_id = %session.user.id,
                "Rejected frame from non-member"
            );
            reply_error(session, denial);
            false
        }
        Err(e) => {
            warn!(
                channel_id = %session.channel_id,
                user_id = %session.user.id,
                error = %e,
                "Membership check failed"
            );
            reply_error(session, "Unable to verify channel membership");
            false
        }
    }
}
