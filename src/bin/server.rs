//! SteamSense HTTP Server Binary
//!
//! This is the main entry point for the SteamSense REST API server.
//! It loads settings, initializes the repository and upstream client, sets up
//! the HTTP router, and starts serving requests.
//!
//! # Usage
//!
//! ```bash
//! # In-memory store (state lost on restart)
//! cargo run --bin steamsense-server
//!
//! # Durable store backed by an append-only journal
//! STEAMSENSE_JOURNAL=./steamsense.jsonl ITAD_API_KEY=... \
//!   cargo run --bin steamsense-server
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8000)
//! - `ITAD_API_KEY`: upstream API key (sync and search disabled without it)
//! - `STEAMSENSE_JOURNAL`: journal file path for a durable store
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use steamsense::config::Settings;
use steamsense::db::RepositoryFactory;
use steamsense::http::{create_router, AppState};
use steamsense::upstream::{ItadClient, PriceSource, UnconfiguredSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .init();

    info!("Starting SteamSense HTTP Server");

    let settings = Settings::load().map_err(anyhow::Error::msg)?;

    let repository = RepositoryFactory::from_settings(settings.journal_path.as_deref())
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    match settings.journal_path.as_deref() {
        Some(path) => info!("Repository initialized with journal at {}", path.display()),
        None => info!("Repository initialized in memory (no journal configured)"),
    }

    let source: Arc<dyn PriceSource> = match ItadClient::from_settings(&settings) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("Upstream source unavailable ({e}); sync and search endpoints will fail");
            Arc::new(UnconfiguredSource)
        }
    };

    // Create application state and router
    let state = AppState::new(repository, source, settings);
    let app = create_router(state);

    // Determine bind address
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Server listening on http://{}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
