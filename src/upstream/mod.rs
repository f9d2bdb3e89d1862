//! Upstream price source abstraction.
//!
//! The sync processor and a couple of live read endpoints talk to an external
//! catalog/price API. Everything goes through the [`PriceSource`] trait so
//! tests can substitute a stub source; the production implementation is the
//! IsThereAnyDeal-style client in [`itad`].

pub mod itad;

pub use itad::ItadClient;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PriceRecord;

/// Result type for upstream operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors from the upstream price source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source is not usable because required configuration is missing.
    #[error("upstream source is not configured: {0}")]
    Unconfigured(String),

    /// Transport-level failure (connect, TLS, body read).
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The source answered with a non-success status.
    #[error("upstream returned HTTP {status} for {path}")]
    Status { status: u16, path: String },

    /// The response body did not match the expected shape.
    #[error("could not decode upstream response for {path}: {message}")]
    Decode { path: String, message: String },

    /// Retries (rate limiting, timeouts) were exhausted.
    #[error("upstream retries exhausted for {path}")]
    Exhausted { path: String },
}

/// Catalog identity of a game as known by the upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRef {
    pub id: String,
    pub slug: String,
    pub title: String,
}

/// One hit of an upstream title search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Current price at one shop, as reported live by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopPrice {
    pub price_usd: f64,
    pub regular_usd: f64,
    pub cut_pct: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Stand-in source used when no API key is configured: every call fails
/// with `Unconfigured`, so sync jobs and live reads degrade with a clear
/// message instead of a panic or a silent no-op.
pub struct UnconfiguredSource;

#[async_trait]
impl PriceSource for UnconfiguredSource {
    async fn lookup_appid(&self, _appid: u32) -> SourceResult<Option<GameRef>> {
        Err(SourceError::Unconfigured("ITAD_API_KEY is not set".to_string()))
    }

    async fn game_info(&self, _game_id: &str) -> SourceResult<Option<GameRef>> {
        Err(SourceError::Unconfigured("ITAD_API_KEY is not set".to_string()))
    }

    async fn price_history(
        &self,
        _game_id: &str,
        _appid: Option<u32>,
        _since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<PriceRecord>> {
        Err(SourceError::Unconfigured("ITAD_API_KEY is not set".to_string()))
    }

    async fn search(&self, _query: &str, _limit: usize) -> SourceResult<Vec<SearchHit>> {
        Err(SourceError::Unconfigured("ITAD_API_KEY is not set".to_string()))
    }

    async fn current_prices(&self, _game_id: &str) -> SourceResult<BTreeMap<String, ShopPrice>> {
        Err(SourceError::Unconfigured("ITAD_API_KEY is not set".to_string()))
    }

    async fn top_appids(&self, _limit: usize) -> SourceResult<Vec<u32>> {
        Err(SourceError::Unconfigured("ITAD_API_KEY is not set".to_string()))
    }
}

/// An external catalog/price API.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Resolve a Steam appid to the source's catalog identity.
    async fn lookup_appid(&self, appid: u32) -> SourceResult<Option<GameRef>>;

    /// Resolve a catalog id to its slug/title, when the source knows it.
    async fn game_info(&self, game_id: &str) -> SourceResult<Option<GameRef>>;

    /// Full (or `since`-bounded) price history, normalized to records.
    async fn price_history(
        &self,
        game_id: &str,
        appid: Option<u32>,
        since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<PriceRecord>>;

    /// Title search.
    async fn search(&self, query: &str, limit: usize) -> SourceResult<Vec<SearchHit>>;

    /// Live per-shop prices for one game.
    async fn current_prices(&self, game_id: &str) -> SourceResult<BTreeMap<String, ShopPrice>>;

    /// Appids of the most popular games, best first, at most `limit`.
    async fn top_appids(&self, limit: usize) -> SourceResult<Vec<u32>>;
}
