use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coderoom_server::config::ServerConfig;
use coderoom_server::db::pool::{create_pool, run_migrations};
use coderoom_server::db::store::SqliteRoomStore;
use coderoom_server::engine::connection_registry::ConnectionRegistry;
use coderoom_server::engine::directory::RoomDirectory;
use coderoom_server::engine::reconciler::PresenceReconciler;
use coderoom_server::engine::room_store::{MemoryRoomStore, RoomStore};
use coderoom_server::web::app_state::AppState;
use coderoom_server::web::router::build_router;

#[derive(Parser)]
#[command(name = "coderoom-server", about = "Room membership and live presence server")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "coderoom.toml")]
    config: String,

    /// Keep rooms in memory instead of SQLite (nothing survives a restart)
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;

    let store: Arc<dyn RoomStore> = if cli.in_memory {
        info!("Using in-memory room store");
        Arc::new(MemoryRoomStore::new())
    } else {
        let pool = create_pool(&config.database.url)
            .await
            .context("failed to connect to database")?;
        run_migrations(&pool)
            .await
            .context("failed to run database migrations")?;
        Arc::new(SqliteRoomStore::new(pool))
    };

    let registry = Arc::new(ConnectionRegistry::new());
    let directory = RoomDirectory::new(store, PresenceReconciler::new(registry.clone()))
        .with_default_language(config.rooms.default_language.clone());

    let app_state = Arc::new(AppState {
        directory: Arc::new(directory),
        registry: registry.clone(),
        auth_config: config.to_auth_config(),
    });

    let app = build_router(app_state);

    let web_addr = &config.server.web_address;
    let listener = tokio::net::TcpListener::bind(web_addr)
        .await
        .with_context(|| format!("failed to bind web listener on {web_addr}"))?;

    info!("Coderoom server starting on {}", web_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    registry.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
