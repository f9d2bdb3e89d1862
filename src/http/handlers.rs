//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! repository, the prediction engine, or the sync service for the actual
//! work.

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;

use super::dto::{
    CurrentPricesResponse, GameStatsResponse, GameSummary, HealthResponse, HistoryQuery,
    JobStatusResponse, ListGamesQuery, OverviewStats, PredictQuery, PredictionView,
    PriceHistoryResponse, SearchHit, SearchQuery, ShopPrice, SyncAcceptedResponse, SyncTopQuery,
    TopDeal, TopPrediction, TopQuery,
};
use super::error::AppError;
use super::state::AppState;
use crate::api::{PredictionOutcome, Signal};
use crate::models::parse_timestamp;
use crate::services::stats::{compute_seasonal_patterns, compute_stats};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;
const DEFAULT_TOP_LIMIT: usize = 12;
const MAX_TOP_LIMIT: usize = 100;
const SEARCH_RESULT_LIMIT: usize = 20;
const DEFAULT_SYNC_TOP_N: usize = 100;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the store is
/// accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository.game_count().await {
        Ok(_) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        db: db_status,
        model: "heuristic".to_string(),
        env: state.settings.env.clone(),
    }))
}

// =============================================================================
// Games
// =============================================================================

/// GET /games?limit&offset
///
/// Paginated list of synced games with record summaries.
pub async fn list_games(
    State(state): State<AppState>,
    Query(query): Query<ListGamesQuery>,
) -> HandlerResult<Vec<GameSummary>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    let offset = query.offset.unwrap_or(0);
    let games = state.repository.list_games(limit, offset).await?;
    Ok(Json(games))
}

/// GET /games/search?q=
///
/// Title search against the upstream catalog.
pub async fn search_games(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> HandlerResult<Vec<SearchHit>> {
    if query.q.trim().is_empty() {
        return Err(AppError::BadRequest("q must not be empty".to_string()));
    }
    let hits = state.source.search(&query.q, SEARCH_RESULT_LIMIT).await?;
    Ok(Json(hits))
}

/// GET /games/{game_id}
///
/// Summary statistics and seasonal patterns for one game. A game with no
/// ingested records is a 404, not an empty stats object; the frontend shows
/// it as "still syncing".
pub async fn get_game_stats(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> HandlerResult<GameStatsResponse> {
    let game = state.repository.get_game(&game_id).await?;
    let history = state.repository.history(&game_id, None, None).await?;
    if history.is_empty() {
        return Err(AppError::NotFound(format!(
            "No price records yet for: {game_id}"
        )));
    }
    let stats = compute_stats(&history, chrono::Utc::now());
    let seasonal_patterns = compute_seasonal_patterns(&history);
    Ok(Json(GameStatsResponse {
        game_id: game.id,
        title: game.title,
        appid: game.appid,
        stats,
        seasonal_patterns,
    }))
}

/// GET /games/top/deals?limit
///
/// Games with the best current discounts.
pub async fn get_top_deals(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> HandlerResult<Vec<TopDeal>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT).min(MAX_TOP_LIMIT);
    let deals = state.repository.top_deals(limit).await?;
    Ok(Json(deals))
}

/// GET /games/top/buy?limit
///
/// Games with the strongest cached BUY signals.
pub async fn get_top_buy_signals(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> HandlerResult<Vec<TopPrediction>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT).min(MAX_TOP_LIMIT);
    let ranked = state.repository.top_predictions(Signal::Buy, limit).await?;
    Ok(Json(ranked))
}

/// GET /games/{game_id}/current-prices
///
/// Live per-shop prices from the upstream source, falling back to the latest
/// stored record per shop when the upstream is unreachable or unconfigured.
pub async fn get_current_prices(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> HandlerResult<CurrentPricesResponse> {
    let game = state.repository.get_game(&game_id).await?;

    let prices = match state.source.current_prices(&game.id).await {
        Ok(prices) if !prices.is_empty() => prices,
        _ => state
            .repository
            .latest_prices(&game.id)
            .await?
            .into_iter()
            .map(|(shop, record)| {
                (
                    shop,
                    ShopPrice {
                        price_usd: record.price_usd,
                        regular_usd: record.regular_usd,
                        cut_pct: record.cut_pct,
                        timestamp: Some(record.timestamp),
                    },
                )
            })
            .collect(),
    };

    Ok(Json(CurrentPricesResponse {
        game_id: game.id,
        prices,
    }))
}

// =============================================================================
// Prices
// =============================================================================

/// GET /prices/{game_id}/history?since&until
///
/// A game's price history, ascending by timestamp. A known game with no
/// records returns an empty history, not an error.
pub async fn get_price_history(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> HandlerResult<PriceHistoryResponse> {
    let game = state.repository.get_game(&game_id).await?;
    let since = query
        .since
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let until = query
        .until
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let history = state.repository.history(&game.id, since, until).await?;
    Ok(Json(PriceHistoryResponse {
        game_id: game.id,
        title: game.title,
        appid: game.appid,
        count: history.len(),
        history: history.into_iter().map(Into::into).collect(),
    }))
}

// =============================================================================
// Prediction
// =============================================================================

/// GET /predict/{game_id}?force_refresh=
///
/// BUY/WAIT classification for a game. Served from the per-game cache when
/// fresh; `force_refresh=true` always recomputes.
pub async fn predict(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Query(query): Query<PredictQuery>,
) -> HandlerResult<PredictionView> {
    let outcome = state
        .engine
        .predict(state.repository.as_ref(), &game_id, query.force_refresh)
        .await?;
    match outcome {
        PredictionOutcome::Ready(view) => Ok(Json(view)),
        PredictionOutcome::Pending { records, required } => {
            Err(AppError::InsufficientHistory { records, required })
        }
        PredictionOutcome::NotFound => {
            Err(AppError::NotFound(format!("Game not found: {game_id}")))
        }
    }
}

// =============================================================================
// Overview
// =============================================================================

/// GET /stats/overview
///
/// Global counters for the dashboard.
pub async fn get_overview_stats(State(state): State<AppState>) -> HandlerResult<OverviewStats> {
    let total_games = state.repository.game_count().await?;
    let total_records = state.repository.record_count().await?;
    let (buy_signals, wait_signals) = state.repository.signal_counts().await?;
    Ok(Json(OverviewStats {
        total_games,
        total_records,
        buy_signals,
        wait_signals,
    }))
}

// =============================================================================
// Sync
// =============================================================================

fn sync_accepted(job_id: String) -> (axum::http::StatusCode, Json<SyncAcceptedResponse>) {
    let message = format!("Sync started. Track progress at /sync/jobs/{job_id}/logs");
    (
        axum::http::StatusCode::ACCEPTED,
        Json(SyncAcceptedResponse { job_id, message }),
    )
}

/// POST /sync/game/{appid}
///
/// Start a background sync of one game by Steam appid.
pub async fn sync_game_by_appid(
    State(state): State<AppState>,
    Path(appid): Path<u32>,
) -> Result<(axum::http::StatusCode, Json<SyncAcceptedResponse>), AppError> {
    Ok(sync_accepted(state.sync.spawn_sync_by_appid(appid)))
}

/// POST /sync/id/{game_id}
///
/// Start a background sync of one game by catalog id. Called by the frontend
/// when the user picks a search result that is not in the store yet.
pub async fn sync_game_by_id(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<(axum::http::StatusCode, Json<SyncAcceptedResponse>), AppError> {
    Ok(sync_accepted(state.sync.spawn_sync_by_game_id(game_id)))
}

/// POST /sync/top?top_n=
///
/// Start a background bulk sync of the N most popular games.
pub async fn sync_top_games(
    State(state): State<AppState>,
    Query(query): Query<SyncTopQuery>,
) -> Result<(axum::http::StatusCode, Json<SyncAcceptedResponse>), AppError> {
    let top_n = query.top_n.unwrap_or(DEFAULT_SYNC_TOP_N);
    if !(10..=500).contains(&top_n) {
        return Err(AppError::BadRequest(
            "top_n must be between 10 and 500".to_string(),
        ));
    }
    Ok(sync_accepted(state.sync.spawn_sync_top(top_n)))
}

// =============================================================================
// Async Job Management
// =============================================================================

/// GET /sync/jobs/{job_id}
///
/// Get the current status and logs of a background sync job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> HandlerResult<JobStatusResponse> {
    let job = state
        .jobs
        .get_job(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        status: format!("{:?}", job.status).to_lowercase(),
        logs: job.logs,
        result: job.result,
    }))
}

/// GET /sync/jobs/{job_id}/logs
///
/// Stream sync job logs via Server-Sent Events (SSE).
pub async fn stream_job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Verify job exists
    if state.jobs.get_job(&job_id).is_none() {
        return Err(AppError::NotFound(format!("Job {} not found", job_id)));
    }

    let tracker = state.jobs.clone();
    let stream = async_stream::stream! {
        let mut last_log_count = 0;
        loop {
            // Send new logs since last check
            let logs = tracker.get_logs(&job_id);
            for log in logs.iter().skip(last_log_count) {
                let event_data = serde_json::to_string(log).unwrap_or_default();
                yield Ok(Event::default().data(event_data));
            }
            last_log_count = logs.len();

            // Check if job is complete
            if let Some(job) = tracker.get_job(&job_id) {
                if job.status != crate::services::job_tracker::JobStatus::Running {
                    let final_event = serde_json::json!({
                        "status": job.status,
                        "result": job.result,
                    });
                    yield Ok(Event::default()
                        .event("complete")
                        .data(serde_json::to_string(&final_event).unwrap_or_default()));
                    break;
                }
            } else {
                break;
            }

            // Wait before checking again
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}
