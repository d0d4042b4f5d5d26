//! Server lifecycle management
//!
//! Binds the HTTP listener, serves the API and WebSocket routes, and shuts
//! down gracefully on Ctrl+C or SIGTERM.

use std::sync::Arc;
use tracing::{error, info};

use huddle_api::http::{create_router, AppState};
use huddle_core::{service::JwtService, ChatStore, Config};
use huddle_hub::HubHandle;

/// Huddle server - owns everything the HTTP layer needs
pub struct HuddleServer {
    config: Config,
    state: AppState,
}

impl HuddleServer {
    /// Create a new server instance
    pub fn new(
        config: Config,
        store: Arc<dyn ChatStore>,
        jwt_service: JwtService,
        chat_hub: HubHandle,
        signaling_hub: HubHandle,
    ) -> Self {
        let state = AppState::new(
            store,
            jwt_service,
            chat_hub,
            signaling_hub,
            config.realtime.clone(),
        );
        Self { config, state }
    }

    /// Serve until a shutdown signal arrives
    pub async fn run(self) -> anyhow::Result<()> {
        let http_address = self.config.http_address();
        let http_addr: std::net::SocketAddr = http_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;

        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_addr}: {e}"))?;

        info!("HTTP server listening on {}", http_addr);

        let router = create_router(self.state);
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("HTTP server error: {}", e);
            return Err(e.into());
        }

        info!("Huddle server shut down complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C, starting graceful shutdown"); }
        () = terminate => { info!("Received SIGTERM, starting graceful shutdown"); }
    }
}
