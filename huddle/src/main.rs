mod migrations;
mod server;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use huddle_core::{
    bootstrap::{init_database, init_dev_store, load_config},
    config::Config,
    logging,
    models::UserId,
    service::JwtService,
    ChatStore, PgStore,
};
use huddle_hub::{Hub, HubKind};

use server::HuddleServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Huddle server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Storage
    let store: Arc<dyn ChatStore> = if config.database.url.is_empty() {
        warn!("database.url is empty, using the in-memory store; nothing will be persisted");
        Arc::new(init_dev_store(&config.dev)?)
    } else {
        let pool = init_database(&config).await?;
        migrations::run_migrations(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    // 4. Auth
    let jwt_service = JwtService::new(&config.jwt)?;
    if config.database.url.is_empty() {
        log_dev_tokens(&config, &jwt_service)?;
    }

    // 5. Realtime hubs, one coordination loop each
    let chat_hub = Hub::spawn(HubKind::Chat, config.realtime.command_buffer);
    let signaling_hub = Hub::spawn(HubKind::Signaling, config.realtime.command_buffer);
    info!("Chat and signaling hubs started");

    // 6. Serve until shutdown
    HuddleServer::new(config, store, jwt_service, chat_hub, signaling_hub)
        .run()
        .await
}

/// Print a token per seeded user so the in-memory server can be used right away
fn log_dev_tokens(config: &Config, jwt_service: &JwtService) -> Result<()> {
    for user in &config.dev.users {
        let token = jwt_service.sign_token(&UserId::from(user.id.as_str()))?;
        info!(user_id = %user.id, username = %user.username, %token, "Development token");
    }
    Ok(())
}
