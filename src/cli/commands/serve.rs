//! HTTP server command.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::config::{Config, ConfigArgs};
use crate::db::{self, Storage};
use crate::enrichment::MetadataClient;

/// Load configuration, prepare the database and serve until Ctrl-C.
pub fn cmd_serve(rt: &Runtime, args: &ConfigArgs) -> anyhow::Result<()> {
    let config = Config::load(args)?;
    rt.block_on(serve(config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::init_db(&config.database.url, config.database.max_connections).await?;
    info!("Database ready");

    let storage = Storage::new(pool);
    storage.create_indexes().await?;

    let metadata = MetadataClient::new(&config.metadata)?;
    info!(base_url = %config.metadata.base_url, "Metadata client configured");

    let state = AppState::new(storage, Arc::new(metadata));
    let app = api::router(state, config.server.request_timeout());

    let listener = TcpListener::bind(("0.0.0.0", config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
    }
}
