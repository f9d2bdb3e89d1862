//! End-to-end prediction flow: cache behavior and single-flight
//! recomputation under concurrency.

mod support;

use std::sync::Arc;

use steamsense::api::PredictionOutcome;
use steamsense::db::repositories::LocalRepository;
use steamsense::db::repository::{FullRepository, GameStore, PriceStore};
use steamsense::models::Game;
use steamsense::services::PredictionEngine;
use support::record;

async fn repo_with_history(records: usize) -> Arc<dyn FullRepository> {
    let repo = LocalRepository::new();
    repo.upsert_game(&Game::new("g1", "portal-2", "Portal 2").with_appid(620))
        .await
        .unwrap();
    let batch: Vec<_> = (0..records)
        .map(|i| record("g1", (i % 12) as u32 + 1, (i / 12) as u32 + 1, 10.0 - (i % 5) as f64, 10.0))
        .collect();
    if !batch.is_empty() {
        repo.ingest("g1", batch).await.unwrap();
    }
    Arc::new(repo)
}

#[tokio::test]
async fn test_predict_below_minimum_is_pending() {
    let repo = repo_with_history(2).await;
    let engine = PredictionEngine::new();
    let outcome = engine.predict(repo.as_ref(), "g1", false).await.unwrap();
    assert!(matches!(outcome, PredictionOutcome::Pending { records: 2, .. }));
}

#[tokio::test]
async fn test_predict_at_minimum_succeeds_and_caches() {
    let repo = repo_with_history(3).await;
    let engine = PredictionEngine::new();

    let first = engine.predict(repo.as_ref(), "g1", false).await.unwrap();
    let PredictionOutcome::Ready(first_view) = first else {
        panic!("expected Ready outcome");
    };
    assert!(!first_view.from_cache);
    assert!(first_view.prediction.score >= 0.0 && first_view.prediction.score <= 100.0);

    let second = engine.predict(repo.as_ref(), "g1", false).await.unwrap();
    let PredictionOutcome::Ready(second_view) = second else {
        panic!("expected Ready outcome");
    };
    assert!(second_view.from_cache);
    assert_eq!(engine.recomputations(), 1);
}

/// Delegating repository whose `history` call yields for a moment, so a
/// burst of concurrent predictions genuinely overlaps while the winner is
/// recomputing.
struct SlowHistoryRepo {
    inner: LocalRepository,
}

#[async_trait::async_trait]
impl GameStore for SlowHistoryRepo {
    async fn upsert_game(&self, game: &Game) -> steamsense::db::RepositoryResult<()> {
        self.inner.upsert_game(game).await
    }
    async fn get_game(&self, game_id: &str) -> steamsense::db::RepositoryResult<Game> {
        self.inner.get_game(game_id).await
    }
    async fn get_game_by_appid(
        &self,
        appid: u32,
    ) -> steamsense::db::RepositoryResult<Option<Game>> {
        self.inner.get_game_by_appid(appid).await
    }
    async fn list_games(
        &self,
        limit: usize,
        offset: usize,
    ) -> steamsense::db::RepositoryResult<Vec<steamsense::api::GameSummary>> {
        self.inner.list_games(limit, offset).await
    }
    async fn game_count(&self) -> steamsense::db::RepositoryResult<usize> {
        self.inner.game_count().await
    }
}

#[async_trait::async_trait]
impl PriceStore for SlowHistoryRepo {
    async fn ingest(
        &self,
        game_id: &str,
        batch: Vec<steamsense::models::PriceRecord>,
    ) -> steamsense::db::RepositoryResult<steamsense::api::IngestOutcome> {
        self.inner.ingest(game_id, batch).await
    }
    async fn history(
        &self,
        game_id: &str,
        since: Option<chrono::DateTime<chrono::Utc>>,
        until: Option<chrono::DateTime<chrono::Utc>>,
    ) -> steamsense::db::RepositoryResult<Vec<steamsense::models::PriceRecord>> {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.inner.history(game_id, since, until).await
    }
    async fn latest_prices(
        &self,
        game_id: &str,
    ) -> steamsense::db::RepositoryResult<
        std::collections::BTreeMap<String, steamsense::models::PriceRecord>,
    > {
        self.inner.latest_prices(game_id).await
    }
    async fn top_deals(
        &self,
        limit: usize,
    ) -> steamsense::db::RepositoryResult<Vec<steamsense::api::TopDeal>> {
        self.inner.top_deals(limit).await
    }
    async fn record_count(&self) -> steamsense::db::RepositoryResult<usize> {
        self.inner.record_count().await
    }
}

#[async_trait::async_trait]
impl steamsense::db::repository::PredictionStore for SlowHistoryRepo {
    async fn cached_prediction(
        &self,
        game_id: &str,
    ) -> steamsense::db::RepositoryResult<Option<steamsense::api::CachedPrediction>> {
        self.inner.cached_prediction(game_id).await
    }
    async fn store_prediction(
        &self,
        entry: steamsense::api::CachedPrediction,
    ) -> steamsense::db::RepositoryResult<()> {
        self.inner.store_prediction(entry).await
    }
    async fn signal_counts(&self) -> steamsense::db::RepositoryResult<(usize, usize)> {
        self.inner.signal_counts().await
    }
    async fn top_predictions(
        &self,
        signal: steamsense::api::Signal,
        limit: usize,
    ) -> steamsense::db::RepositoryResult<Vec<steamsense::api::TopPrediction>> {
        self.inner.top_predictions(signal, limit).await
    }
}

#[tokio::test]
async fn test_concurrent_force_refresh_single_flight() {
    let inner = LocalRepository::new();
    inner
        .upsert_game(&Game::new("g1", "portal-2", "Portal 2"))
        .await
        .unwrap();
    inner
        .ingest(
            "g1",
            vec![
                record("g1", 1, 1, 10.0, 10.0),
                record("g1", 2, 1, 8.0, 10.0),
                record("g1", 3, 1, 6.0, 10.0),
            ],
        )
        .await
        .unwrap();
    let repo: Arc<dyn FullRepository> = Arc::new(SlowHistoryRepo { inner });
    let engine = Arc::new(PredictionEngine::new());

    // A burst of concurrent force refreshes must coalesce into one
    // recomputation: whoever wins the per-game lock recomputes, the rest
    // arrive while it runs, then see an entry newer than their own arrival
    // and serve it.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            engine.predict(repo.as_ref(), "g1", true).await.unwrap()
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, PredictionOutcome::Ready(_)));
    }

    assert_eq!(engine.recomputations(), 1);
}

#[tokio::test]
async fn test_predictions_feed_overview_counts() {
    use steamsense::db::repository::PredictionStore;

    let repo = repo_with_history(6).await;
    let engine = PredictionEngine::new();
    let _ = engine.predict(repo.as_ref(), "g1", false).await.unwrap();

    let (buy, wait) = repo.signal_counts().await.unwrap();
    assert_eq!(buy + wait, 1);
}

#[tokio::test]
async fn test_top_buy_listing_joins_latest_price() {
    use steamsense::api::Signal;
    use steamsense::db::repository::PredictionStore;

    let repo = LocalRepository::new();
    repo.upsert_game(&Game::new("g1", "portal-2", "Portal 2"))
        .await
        .unwrap();
    // Ends at 60% off its all-time range: a clear BUY.
    repo.ingest(
        "g1",
        vec![
            record("g1", 1, 1, 10.0, 10.0),
            record("g1", 2, 1, 10.0, 10.0),
            record("g1", 3, 1, 4.0, 10.0),
        ],
    )
    .await
    .unwrap();

    let engine = PredictionEngine::new();
    let outcome = engine.predict(&repo, "g1", false).await.unwrap();
    let PredictionOutcome::Ready(view) = outcome else {
        panic!("expected Ready outcome");
    };
    assert_eq!(view.prediction.signal, Signal::Buy);

    let top = repo.top_predictions(Signal::Buy, 10).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].id, "g1");
    assert_eq!(top[0].current_price, 4.0);
    assert_eq!(top[0].discount_pct, 60);
}
