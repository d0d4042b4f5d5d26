// Module: http
// REST endpoints and the WebSocket upgrade routes for chat and voice/video

pub mod channel;
pub mod error;
pub mod health;
pub mod middleware;
pub mod websocket;

use axum::{routing::get, Router};
use huddle_core::config::RealtimeConfig;
use huddle_core::service::{JwtService, JwtValidator};
use huddle_core::ChatStore;
use huddle_hub::{ChatRelay, HubHandle, SignalingRelay};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};
pub use middleware::AuthUser;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub jwt_validator: Arc<JwtValidator>,
    pub chat_relay: Arc<ChatRelay>,
    pub signaling_relay: Arc<SignalingRelay>,
    pub realtime: RealtimeConfig,
}

impl AppState {
    /// Wire the relays onto running hubs
    pub fn new(
        store: Arc<dyn ChatStore>,
        jwt_service: JwtService,
        chat_hub: HubHandle,
        signaling_hub: HubHandle,
        realtime: RealtimeConfig,
    ) -> Self {
        let chat_relay = ChatRelay::new(chat_hub, store.clone(), realtime.max_message_length);
        let signaling_relay = SignalingRelay::new(signaling_hub, store.clone());

        Self {
            store,
            jwt_validator: Arc::new(JwtValidator::new(Arc::new(jwt_service))),
            chat_relay: Arc::new(chat_relay),
            signaling_relay: Arc::new(signaling_relay),
            realtime,
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .merge(health::create_health_router())
        // Realtime upgrades
        .route("/ws/{channel_id}", get(websocket::chat_websocket_handler))
        .route("/ws/rtc/{channel_id}", get(websocket::rtc_websocket_handler))
        // Channel presence and media state
        .route("/api/channels/{channel_id}/peers", get(channel::list_peers))
        .route(
            "/api/channels/{channel_id}/media-sessions",
            get(channel::list_media_sessions),
        );

    // Apply layers before state
    let router = router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Apply state to all routes (must be last)
    router.with_state(state)
}
