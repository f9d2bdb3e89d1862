#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::api::{PredictionOutcome, Signal};
    use crate::models::{Game, PriceRecord};
    use crate::services::predict::{
        score_price_context, PredictionEngine, BUY_THRESHOLD, MIN_HISTORY_RECORDS,
    };
    use crate::services::stats::{compute_seasonal_patterns, compute_stats};
    use crate::db::LocalRepository;
    use crate::db::repository::{GameStore, PriceStore};

    fn record(month: u32, price: f64, regular: f64) -> PriceRecord {
        PriceRecord::normalized(
            "g1",
            Some(61),
            "Steam",
            Utc.with_ymd_and_hms(2024, month, 1, 12, 0, 0).unwrap(),
            price,
            regular,
        )
    }

    async fn seeded_repo(records: Vec<PriceRecord>) -> LocalRepository {
        let repo = LocalRepository::new();
        repo.upsert_game(&Game::new("g1", "some-game", "Some Game").with_appid(620))
            .await
            .unwrap();
        if !records.is_empty() {
            repo.ingest("g1", records).await.unwrap();
        }
        repo
    }

    #[test]
    fn test_deep_discount_at_low_scores_buy() {
        let records = vec![
            record(1, 20.0, 20.0),
            record(2, 15.0, 20.0),
            record(3, 5.0, 20.0),
        ];
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let stats = compute_stats(&records, now);
        let seasonal = compute_seasonal_patterns(&records);
        let scored = score_price_context(&stats, &records[2], &seasonal, now);
        assert!(scored.prediction.score >= BUY_THRESHOLD);
        assert_eq!(scored.prediction.signal, Signal::Buy);
        assert!(scored.prediction.reason.contains("all-time low"));
    }

    #[test]
    fn test_full_price_scores_wait() {
        let records = vec![
            record(1, 10.0, 20.0),
            record(2, 20.0, 20.0),
            record(3, 20.0, 20.0),
        ];
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let stats = compute_stats(&records, now);
        let seasonal = compute_seasonal_patterns(&records);
        let scored = score_price_context(&stats, &records[2], &seasonal, now);
        assert!(scored.prediction.score < BUY_THRESHOLD);
        assert_eq!(scored.prediction.signal, Signal::Wait);
    }

    #[test]
    fn test_confidence_grows_with_history() {
        let now = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        let short: Vec<PriceRecord> = (1..=3).map(|m| record(m, 10.0, 20.0)).collect();
        let long: Vec<PriceRecord> = (1..=12).map(|m| record(m, 10.0, 20.0)).collect();
        let short_stats = compute_stats(&short, now);
        let long_stats = compute_stats(&long, now);
        let a = score_price_context(&short_stats, &short[2], &[], now);
        let b = score_price_context(&long_stats, &long[11], &[], now);
        assert!(b.prediction.confidence > a.prediction.confidence);
    }

    #[test]
    fn test_score_stays_in_range() {
        let records = vec![
            record(1, 0.99, 59.99),
            record(2, 0.99, 59.99),
            record(3, 0.99, 59.99),
        ];
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let stats = compute_stats(&records, now);
        let scored = score_price_context(&stats, &records[2], &[], now);
        assert!(scored.prediction.score <= 100.0);
        assert!(scored.prediction.score >= 0.0);
    }

    #[tokio::test]
    async fn test_predict_insufficient_history() {
        let repo = seeded_repo(vec![record(1, 10.0, 20.0), record(2, 9.0, 20.0)]).await;
        let engine = PredictionEngine::new();
        match engine.predict(&repo, "g1", false).await.unwrap() {
            PredictionOutcome::Pending { records, required } => {
                assert_eq!(records, 2);
                assert_eq!(required, MIN_HISTORY_RECORDS);
            }
            other => panic!("expected Pending, got {:?}", other),
        }
        assert_eq!(engine.recomputations(), 0);
    }

    #[tokio::test]
    async fn test_predict_succeeds_at_threshold() {
        let repo = seeded_repo(vec![
            record(1, 10.0, 20.0),
            record(2, 9.0, 20.0),
            record(3, 8.0, 20.0),
        ])
        .await;
        let engine = PredictionEngine::new();
        match engine.predict(&repo, "g1", false).await.unwrap() {
            PredictionOutcome::Ready(view) => {
                assert_eq!(view.game_id, "g1");
                assert_eq!(view.title, "Some Game");
                assert!(!view.from_cache);
            }
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_predict_unknown_game() {
        let repo = LocalRepository::new();
        let engine = PredictionEngine::new();
        let outcome = engine.predict(&repo, "missing", false).await.unwrap();
        assert_eq!(outcome, PredictionOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_second_predict_hits_cache() {
        let repo = seeded_repo(vec![
            record(1, 10.0, 20.0),
            record(2, 9.0, 20.0),
            record(3, 8.0, 20.0),
        ])
        .await;
        let engine = PredictionEngine::new();
        let first = engine.predict(&repo, "g1", false).await.unwrap();
        let second = engine.predict(&repo, "g1", false).await.unwrap();
        match (first, second) {
            (PredictionOutcome::Ready(a), PredictionOutcome::Ready(b)) => {
                assert!(!a.from_cache);
                assert!(b.from_cache);
                assert_eq!(a.prediction, b.prediction);
            }
            other => panic!("expected two Ready outcomes, got {:?}", other),
        }
        assert_eq!(engine.recomputations(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_recomputes() {
        let repo = seeded_repo(vec![
            record(1, 10.0, 20.0),
            record(2, 9.0, 20.0),
            record(3, 8.0, 20.0),
        ])
        .await;
        let engine = PredictionEngine::new();
        let _ = engine.predict(&repo, "g1", false).await.unwrap();
        match engine.predict(&repo, "g1", true).await.unwrap() {
            PredictionOutcome::Ready(view) => assert!(!view.from_cache),
            other => panic!("expected Ready, got {:?}", other),
        }
        assert_eq!(engine.recomputations(), 2);
    }
}
