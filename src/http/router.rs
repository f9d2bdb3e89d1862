//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Games
        .route("/games", get(handlers::list_games))
        .route("/games/search", get(handlers::search_games))
        .route("/games/top/deals", get(handlers::get_top_deals))
        .route("/games/top/buy", get(handlers::get_top_buy_signals))
        .route("/games/{game_id}", get(handlers::get_game_stats))
        .route(
            "/games/{game_id}/current-prices",
            get(handlers::get_current_prices),
        )
        // Prices
        .route("/prices/{game_id}/history", get(handlers::get_price_history))
        // Prediction
        .route("/predict/{game_id}", get(handlers::predict))
        // Overview
        .route("/stats/overview", get(handlers::get_overview_stats))
        // Sync + job tracking
        .route("/sync/game/{appid}", post(handlers::sync_game_by_appid))
        .route("/sync/id/{game_id}", post(handlers::sync_game_by_id))
        .route("/sync/top", post(handlers::sync_top_games))
        .route("/sync/jobs/{job_id}", get(handlers::get_job_status))
        .route("/sync/jobs/{job_id}/logs", get(handlers::stream_job_logs))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
