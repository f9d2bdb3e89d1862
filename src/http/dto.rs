//! Data Transfer Objects for the HTTP API.
//!
//! These DTOs are used for request/response serialization in the REST API.
//! Most view types are re-exported from [`crate::api`] since they already
//! derive Serialize/Deserialize.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// Re-export existing view types that are already serializable
pub use crate::api::{
    GameSummary, OverviewStats, PricePoint, PriceStats, PredictionView, SeasonalPattern, TopDeal,
    TopPrediction,
};
pub use crate::upstream::{SearchHit, ShopPrice};

/// Query parameters for the paginated game list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListGamesQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Query parameters for title search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// Query parameters for price history: inclusive timestamp bounds, RFC 3339
/// or bare dates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryQuery {
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub until: Option<String>,
}

/// Query parameters for prediction requests.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PredictQuery {
    /// Ignore the cache and recompute.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Query parameters for the top-deals / top-buy listings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Query parameters for the top-N bulk sync.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncTopQuery {
    #[serde(default)]
    pub top_n: Option<usize>,
}

/// Stats payload for one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStatsResponse {
    pub game_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<u32>,
    pub stats: PriceStats,
    pub seasonal_patterns: Vec<SeasonalPattern>,
}

/// Full price history payload for one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryResponse {
    pub game_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<u32>,
    pub count: usize,
    pub history: Vec<PricePoint>,
}

/// Live per-shop prices for one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentPricesResponse {
    pub game_id: String,
    pub prices: BTreeMap<String, ShopPrice>,
}

/// Response for an accepted sync request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAcceptedResponse {
    /// Job ID for tracking the async sync
    pub job_id: String,
    /// Message about the operation
    pub message: String,
}

/// Job status response for async sync processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Job ID
    pub job_id: String,
    /// Job status
    pub status: String,
    /// Log entries
    pub logs: Vec<crate::services::job_tracker::LogEntry>,
    /// Result if completed
    pub result: Option<serde_json::Value>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Storage backend status
    pub db: String,
    /// Prediction model flavor
    pub model: String,
    /// Deployment environment label
    pub env: String,
}
