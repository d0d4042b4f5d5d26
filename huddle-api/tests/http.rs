//! Router-level checks against the in-memory store

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use huddle_api::http::{create_router, AppState};
use huddle_core::bootstrap::init_dev_store;
use huddle_core::config::{Config, JwtConfig, RealtimeConfig};
use huddle_core::models::{AccessType, Channel, MediaKind, User, UserId};
use huddle_core::service::JwtService;
use huddle_core::{ChatStore, MemoryStore};
use huddle_hub::{Hub, HubKind, Relay, SessionHandle};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    jwt: JwtService,
    state: AppState,
    alice: User,
    channel: Channel,
}

fn app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let alice = store.add_user("alice");
    let channel = store.add_channel("general", &alice.id, AccessType::Public);

    let jwt = JwtService::new(&JwtConfig {
        secret: "test-secret".to_string(),
        access_token_duration_hours: 1,
    })
    .unwrap();

    let state = AppState::new(
        store.clone(),
        jwt.clone(),
        Hub::spawn(HubKind::Chat, 64),
        Hub::spawn(HubKind::Signaling, 64),
        RealtimeConfig::default(),
    );

    TestApp {
        router: create_router(state.clone()),
        store,
        jwt,
        state,
        alice,
        channel,
    }
}

async fn get(router: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_exposes_hub_series() {
    let app = app();
    let response = app
        .router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("huddle_ws_sessions_active"));
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let app = app();
    let uri = format!("/api/channels/{}/peers", app.channel.id);

    let (status, body) = get(&app.router, &uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let (status, _) = get(&app.router, &uri, Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_unknown_user_is_rejected() {
    let app = app();
    let ghost = UserId::new();
    let token = app.jwt.sign_token(&ghost).unwrap();

    let uri = format!("/api/channels/{}/peers", app.channel.id);
    let (status, _) = get(&app.router, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_accepted_from_query() {
    let app = app();
    let token = app.jwt.sign_token(&app.alice.id).unwrap();

    let uri = format!("/api/channels/{}/peers?token={token}", app.channel.id);
    let (status, _) = get(&app.router, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_peers_lists_both_hubs() {
    let app = app();
    let token = app.jwt.sign_token(&app.alice.id).unwrap();

    let (session, mut rx) = SessionHandle::new(app.channel.id.clone(), app.alice.summary(), 8);
    app.state
        .signaling_relay
        .hub()
        .register(session)
        .await
        .unwrap();
    // The snapshot reply proves the registration was applied
    rx.recv().await.unwrap();

    let uri = format!("/api/channels/{}/peers", app.channel.id);
    let (status, body) = get(&app.router, &uri, Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat"], serde_json::json!([]));
    assert_eq!(body["voice"][0]["username"], "alice");
    assert!(body["voice"][0].get("connection_id").is_none());
}

#[tokio::test]
async fn test_media_sessions_lists_active_only() {
    let app = app();
    let token = app.jwt.sign_token(&app.alice.id).unwrap();
    app.store
        .upsert_media_session(&app.channel.id, &app.alice.id, MediaKind::Audio, true)
        .await
        .unwrap();
    app.store
        .upsert_media_session(&app.channel.id, &app.alice.id, MediaKind::Screen, false)
        .await
        .unwrap();

    let uri = format!("/api/channels/{}/media-sessions", app.channel.id);
    let (status, body) = get(&app.router, &uri, Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["media_type"], "audio");
    assert_eq!(sessions[0]["user"]["username"], "alice");
}

#[tokio::test]
async fn test_unknown_channel_is_not_found() {
    let app = app();
    let token = app.jwt.sign_token(&app.alice.id).unwrap();

    let (status, body) = get(&app.router, "/api/channels/nope/media-sessions", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Channel not found");
}

#[tokio::test]
async fn test_in_memory_mode_serves_seeded_users() {
    let mut config = Config::default();
    config.database.url = String::new();
    config.jwt.secret = "0123456789abcdef0123456789abcdef".to_string();

    let store: Arc<dyn ChatStore> = Arc::new(init_dev_store(&config.dev).unwrap());
    let jwt = JwtService::new(&config.jwt).unwrap();
    let state = AppState::new(
        store,
        jwt.clone(),
        Hub::spawn(HubKind::Chat, config.realtime.command_buffer),
        Hub::spawn(HubKind::Signaling, config.realtime.command_buffer),
        config.realtime.clone(),
    );
    let router = create_router(state);

    let token = jwt.sign_token(&UserId::from("dev-bob")).unwrap();
    let (status, body) = get(&router, "/api/channels/general/peers", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel_id"], "general");

    let stranger = jwt.sign_token(&UserId::from("anyone")).unwrap();
    let (status, _) = get(&router, "/api/channels/general/peers", Some(&stranger)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
