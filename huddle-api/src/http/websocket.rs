//! WebSocket upgrade handlers
//!
//! Both routes authenticate and authorize before the protocol switch, so a
//! rejected client gets a plain HTTP error instead of a socket that closes
//! straight away.

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    response::{IntoResponse, Response},
};
use huddle_core::models::{ChannelId, UserId, UserSummary};
use huddle_core::ChatStore;
use huddle_hub::{HubKind, Relay};
use std::sync::Arc;
use tracing::info;

use super::{AppError, AppResult, AppState, AuthUser};
use crate::impls::session::run_session;

/// Chat socket
///
/// GET /ws/{channel_id}
pub async fn chat_websocket_handler(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    auth: AuthUser,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let channel_id = ChannelId::from_string(channel_id);
    authorize_upgrade(state.store.as_ref(), HubKind::Chat, &channel_id, auth.user_id()).await?;

    let relay: Arc<dyn Relay> = state.chat_relay.clone();
    Ok(upgrade(ws, &state, relay, channel_id, auth.user.summary()))
}

/// Voice/video signaling socket
///
/// GET /ws/rtc/{channel_id}
pub async fn rtc_websocket_handler(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    auth: AuthUser,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let channel_id = ChannelId::from_string(channel_id);
    authorize_upgrade(
        state.store.as_ref(),
        HubKind::Signaling,
        &channel_id,
        auth.user_id(),
    )
    .await?;

    let relay: Arc<dyn Relay> = state.signaling_relay.clone();
    Ok(upgrade(ws, &state, relay, channel_id, auth.user.summary()))
}

/// Decide whether `user_id` may open a socket on `channel_id`.
///
/// Anyone may read a public channel's chat; private chat and every
/// voice/video channel require membership.
pub async fn authorize_upgrade(
    store: &dyn ChatStore,
    kind: HubKind,
    channel_id: &ChannelId,
    user_id: &UserId,
) -> AppResult<()> {
    if channel_id.as_str().is_empty() {
        return Err(AppError::not_found("Channel not found"));
    }

    let channel = store
        .get_channel(channel_id)
        .await?
        .ok_or_else(|| AppError::not_found("Channel not found"))?;

    let requires_membership = match kind {
        HubKind::Chat => channel.access_type.is_private(),
        HubKind::Signaling => true,
    };
    if requires_membership && !store.is_member(channel_id, user_id).await? {
        return Err(AppError::forbidden(match kind {
            HubKind::Chat => "You must be a member of this private channel",
            HubKind::Signaling => "You must be a member to join voice/video",
        }));
    }

    Ok(())
}

fn upgrade(
    ws: WebSocketUpgrade,
    state: &AppState,
    relay: Arc<dyn Relay>,
    channel_id: ChannelId,
    user: UserSummary,
) -> Response {
    info!(
        hub = %relay.hub().kind(),
        channel_id = %channel_id,
        user_id = %user.id,
        "WebSocket upgrade accepted"
    );

    let config = state.realtime.clone();
    ws.max_message_size(config.max_frame_bytes)
        .max_frame_size(config.max_frame_bytes)
        .on_upgrade(move |socket| run_session(socket, relay, channel_id, user, config))
        .into_response()
}
