//! Read-only views of a channel's realtime state

use axum::{
    extract::{Path, State},
    Json,
};
use huddle_core::models::{ActiveMediaSession, ChannelId};
use huddle_hub::{PeerInfo, Relay};
use serde::Serialize;

use super::{AppError, AppResult, AppState, AuthUser};

#[derive(Debug, Serialize)]
pub struct PeersResponse {
    pub channel_id: ChannelId,
    /// Sessions connected to the chat hub
    pub chat: Vec<PeerInfo>,
    /// Sessions connected to the signaling hub
    pub voice: Vec<PeerInfo>,
}

#[derive(Debug, Serialize)]
pub struct MediaSessionsResponse {
    pub channel_id: ChannelId,
    pub sessions: Vec<ActiveMediaSession>,
}

/// Who is connected to a channel right now
///
/// GET /api/channels/{channel_id}/peers
pub async fn list_peers(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> AppResult<Json<PeersResponse>> {
    let channel_id = ChannelId::from_string(channel_id);
    ensure_channel(&state, &channel_id).await?;

    Ok(Json(PeersResponse {
        chat: state.chat_relay.hub().peers(&channel_id),
        voice: state.signaling_relay.hub().peers(&channel_id),
        channel_id,
    }))
}

/// Active audio, video and screen-share sessions in a channel
///
/// GET /api/channels/{channel_id}/media-sessions
pub async fn list_media_sessions(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> AppResult<Json<MediaSessionsResponse>> {
    let channel_id = ChannelId::from_string(channel_id);
    ensure_channel(&state, &channel_id).await?;

    let sessions = state.store.list_active_media_sessions(&channel_id).await?;
    Ok(Json(MediaSessionsResponse {
        channel_id,
        sessions,
    }))
}

async fn ensure_channel(state: &AppState, channel_id: &ChannelId) -> AppResult<()> {
    match state.store.get_channel(channel_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("Channel not found")),
    }
}
