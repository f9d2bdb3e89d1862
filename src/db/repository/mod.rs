//! Repository trait definitions.
//!
//! The store is split into one trait per concern so callers can depend on
//! exactly what they use; `FullRepository` composes them for the application
//! state. All implementations must be safe under concurrent callers.

pub mod error;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::{
    CachedPrediction, GameSummary, IngestOutcome, Signal, TopDeal, TopPrediction,
};
use crate::models::{Game, PriceRecord};

/// Game catalog operations.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Insert a game or refresh its `slug`/`title`. An existing `appid` is
    /// never overwritten or cleared; a missing one is filled when provided.
    async fn upsert_game(&self, game: &Game) -> RepositoryResult<()>;

    /// Fetch a game by catalog id. Unknown ids are a `NotFound` error,
    /// distinct from a known game with no price records.
    async fn get_game(&self, game_id: &str) -> RepositoryResult<Game>;

    /// Fetch a game by Steam appid, if any game carries it.
    async fn get_game_by_appid(&self, appid: u32) -> RepositoryResult<Option<Game>>;

    /// Games with denormalized record summaries, ordered by record count
    /// descending (ties broken by title).
    async fn list_games(&self, limit: usize, offset: usize) -> RepositoryResult<Vec<GameSummary>>;

    /// Total number of games known to the store.
    async fn game_count(&self) -> RepositoryResult<usize>;
}

/// Append-only price history operations.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Idempotent append of a batch of observations for one game.
    ///
    /// The whole batch is validated before any mutation (all-or-nothing per
    /// batch): the game must exist and every record must carry the matching
    /// `game_id`. Duplicate `(shop_name, timestamp)` keys merge with last
    /// write winning; re-ingesting an identical batch inserts 0 records.
    async fn ingest(&self, game_id: &str, batch: Vec<PriceRecord>)
        -> RepositoryResult<IngestOutcome>;

    /// A game's history ascending by timestamp, with inclusive bounds.
    /// Unknown `game_id` → `NotFound`; known game with no records → empty.
    async fn history(
        &self,
        game_id: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Vec<PriceRecord>>;

    /// Most recent record per shop for one game.
    async fn latest_prices(&self, game_id: &str)
        -> RepositoryResult<BTreeMap<String, PriceRecord>>;

    /// Games with the best current discounts (latest record per game with
    /// `cut_pct > 0`), ordered by discount descending then price ascending.
    async fn top_deals(&self, limit: usize) -> RepositoryResult<Vec<TopDeal>>;

    /// Total number of price records across all games.
    async fn record_count(&self) -> RepositoryResult<usize>;
}

/// Prediction cache operations.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// The cached prediction for a game, if any. Freshness is the caller's
    /// concern; the store only keeps the latest entry per game.
    async fn cached_prediction(&self, game_id: &str)
        -> RepositoryResult<Option<CachedPrediction>>;

    /// Insert or overwrite the cache entry for `entry.game_id`.
    async fn store_prediction(&self, entry: CachedPrediction) -> RepositoryResult<()>;

    /// `(buy, wait)` counts over all cached predictions.
    async fn signal_counts(&self) -> RepositoryResult<(usize, usize)>;

    /// Cached predictions with the given signal, joined with each game's
    /// latest price, ordered by score descending.
    async fn top_predictions(
        &self,
        signal: Signal,
        limit: usize,
    ) -> RepositoryResult<Vec<TopPrediction>>;
}

/// Everything the application needs from a storage backend.
pub trait FullRepository: GameStore + PriceStore + PredictionStore {}

impl<T: GameStore + PriceStore + PredictionStore> FullRepository for T {}
