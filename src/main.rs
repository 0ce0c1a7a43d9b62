//! localoop-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use localoop_gateway::api;
use localoop_gateway::app_state::AppState;
use localoop_gateway::config::{GatewayConfig, StoreBackend};
use localoop_gateway::persistence::{DocumentStore, MemoryStore, PostgresStore};
use localoop_gateway::realtime::{ConnectionRegistry, RealtimeHub};
use localoop_gateway::service::ChatService;
use localoop_gateway::ws::handler::{conversation_ws_handler, location_ws_handler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting localoop-gateway");

    // Build realtime layer
    let registry = Arc::new(ConnectionRegistry::new());
    let hub = RealtimeHub::new(Arc::clone(&registry));

    // Build persistence layer
    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory document store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(config.database_min_connections)
                .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
                .connect(&config.database_url)
                .await?;
            let store = PostgresStore::new(pool);
            store.ensure_schema().await?;
            tracing::info!("using PostgreSQL document store");
            Arc::new(store)
        }
    };

    // Build service layer
    let chat_service = Arc::new(ChatService::new(store, hub.clone()));

    // Build application state
    let app_state = AppState {
        chat_service,
        hub: Arc::new(hub),
    };

    // Periodic connection-statistics logging
    let stats_registry = Arc::clone(&registry);
    let stats_interval = config.stats_interval_secs;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(stats_interval)).await;
            let stats = stats_registry.stats().await;
            tracing::info!(?stats, "connection stats");
        }
    });

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/chat/locations/{location_id}/ws", get(location_ws_handler))
        .route(
            "/chat/conversations/{conversation_id}/ws",
            get(conversation_ws_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
