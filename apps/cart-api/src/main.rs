//! # Merx Cart API
//!
//! HTTP server exposing the cart line mutation endpoint.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart API Server                                  │
//! │                                                                         │
//! │  Back office ───► PATCH /carts/{id}/lines ───► CartMutator ───► SQLite  │
//! │                       (axum)                  (one txn/call)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod routes;
mod state;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ApiConfig;
use crate::state::AppState;
use merx_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting Merx cart API server...");

    // Load configuration
    let config = ApiConfig::load()?;
    info!(
        bind_addr = %config.bind_addr,
        database_path = %config.database_path,
        allow_backorder = config.allow_backorder,
        "Configuration loaded"
    );

    // Connect to the database (runs migrations)
    let db = Database::new(
        DbConfig::new(&config.database_path).allow_backorder(config.allow_backorder),
    )
    .await?;
    info!("Database ready");

    let app = routes::router(AppState::new(db));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves when the process receives ctrl-c.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(?e, "Failed to listen for shutdown signal");
    }
}
