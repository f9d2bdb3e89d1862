//! Prediction engine: classifies a game's current price into BUY/WAIT.
//!
//! The score is a heuristic over the game's price context and history (see
//! the constants below); predictions are cached per game with a freshness
//! window, and recomputation is single-flight per game: concurrent requests
//! for the same game never recompute twice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use parking_lot::Mutex;

use crate::api::{
    CachedPrediction, Prediction, PredictionOutcome, PredictionView, PriceContext, PriceStats,
    SeasonalPattern, Signal,
};
use crate::db::repository::{FullRepository, RepositoryResult};
use crate::models::{Game, PriceRecord};
use crate::services::stats::{compute_seasonal_patterns, compute_stats};

/// Minimum number of price records before a prediction is attempted.
pub const MIN_HISTORY_RECORDS: usize = 3;

/// Cached predictions older than this are recomputed on access.
pub const CACHE_MAX_AGE_HOURS: i64 = 6;

/// Scores at or above this threshold classify as BUY.
pub const BUY_THRESHOLD: f64 = 70.0;

/// Full all-time-low bonus applies up to this multiple of the ATL.
const ATL_NEAR_FACTOR: f64 = 1.02;
/// The ATL bonus fades to zero at this multiple of the ATL.
const ATL_FAR_FACTOR: f64 = 1.30;
/// A month is a "strong sale month" when its average discount is at least
/// this multiple of the game's overall on-sale average.
const SEASONAL_STRONG_FACTOR: f64 = 1.5;
/// Confidence is `n / (n + PIVOT)`: 20 records give 0.5, 80 give 0.8.
const CONFIDENCE_PIVOT: f64 = 20.0;

const ATL_POINTS: f64 = 40.0;
const DISCOUNT_POINTS_PER_PCT: f64 = 0.25;
const DISCOUNT_POINTS_MAX: f64 = 25.0;
const BELOW_AVG_POINTS: f64 = 15.0;
const SEASONAL_PENALTY: f64 = 10.0;
const BASE_SCORE: f64 = 50.0;

/// Prediction engine with a per-game single-flight guard.
///
/// The engine itself holds no prediction state; cache entries live in the
/// repository. It only owns the per-game locks and a recomputation counter.
pub struct PredictionEngine {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    recomputations: AtomicU64,
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            recomputations: AtomicU64::new(0),
        }
    }

    /// Number of score computations performed since startup.
    pub fn recomputations(&self) -> u64 {
        self.recomputations.load(Ordering::Relaxed)
    }

    fn lock_for(&self, game_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(game_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Classify a game's current price context.
    ///
    /// A fresh cached entry is served unless `force_refresh` is set, in which
    /// case the score is recomputed and the cache overwritten. Recomputation
    /// is single-flight per game: a caller that acquires the per-game lock
    /// after a rival already recomputed serves the rival's entry instead of
    /// recomputing again.
    pub async fn predict(
        &self,
        repo: &dyn FullRepository,
        game_id: &str,
        force_refresh: bool,
    ) -> RepositoryResult<PredictionOutcome> {
        let game = match repo.get_game(game_id).await {
            Ok(game) => game,
            Err(e) if e.is_not_found() => return Ok(PredictionOutcome::NotFound),
            Err(e) => return Err(e),
        };

        let arrival = Utc::now();
        if !force_refresh {
            if let Some(entry) = repo.cached_prediction(game_id).await? {
                if is_fresh(&entry, arrival) {
                    return Ok(PredictionOutcome::Ready(view_from(&game, &entry, true)));
                }
            }
        }

        let lock = self.lock_for(game_id);
        let _guard = lock.lock().await;

        // Re-check under the lock: whoever held it before us may have already
        // recomputed. force_refresh only accepts entries newer than our own
        // arrival, so an explicit refresh never returns pre-request data.
        if let Some(entry) = repo.cached_prediction(game_id).await? {
            let acceptable = if force_refresh {
                entry.computed_at >= arrival
            } else {
                is_fresh(&entry, Utc::now())
            };
            if acceptable {
                return Ok(PredictionOutcome::Ready(view_from(&game, &entry, true)));
            }
        }

        let history = repo.history(game_id, None, None).await?;
        if history.len() < MIN_HISTORY_RECORDS {
            return Ok(PredictionOutcome::Pending {
                records: history.len(),
                required: MIN_HISTORY_RECORDS,
            });
        }

        let now = Utc::now();
        let stats = compute_stats(&history, now);
        let seasonal = compute_seasonal_patterns(&history);
        let current = &history[history.len() - 1];
        let scored = score_price_context(&stats, current, &seasonal, now);
        self.recomputations.fetch_add(1, Ordering::Relaxed);

        let entry = CachedPrediction {
            game_id: game_id.to_string(),
            score: scored.prediction.score,
            signal: scored.prediction.signal,
            reason: scored.prediction.reason.clone(),
            confidence: scored.prediction.confidence,
            price_context: scored.context.clone(),
            computed_at: now,
        };
        repo.store_prediction(entry.clone()).await?;

        Ok(PredictionOutcome::Ready(view_from(&game, &entry, false)))
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_fresh(entry: &CachedPrediction, now: DateTime<Utc>) -> bool {
    now - entry.computed_at < Duration::hours(CACHE_MAX_AGE_HOURS)
}

fn view_from(game: &Game, entry: &CachedPrediction, from_cache: bool) -> PredictionView {
    PredictionView {
        game_id: game.id.clone(),
        title: game.title.clone(),
        appid: game.appid,
        prediction: Prediction {
            score: entry.score,
            signal: entry.signal,
            reason: entry.reason.clone(),
            confidence: entry.confidence,
        },
        price_context: entry.price_context.clone(),
        from_cache,
    }
}

pub(crate) struct ScoredContext {
    pub prediction: Prediction,
    pub context: PriceContext,
}

/// Score the latest observation against the game's history.
///
/// Components: base 50, up to 40 for proximity to the all-time low, up to 25
/// proportional to the current discount, up to 15 for sitting below the
/// historical average, minus 10 when a historically strong sale month is
/// running but the game is at full price. Clamped to [0, 100].
pub(crate) fn score_price_context(
    stats: &PriceStats,
    current: &PriceRecord,
    seasonal: &[SeasonalPattern],
    now: DateTime<Utc>,
) -> ScoredContext {
    let mut score = BASE_SCORE;
    let mut notes: Vec<String> = Vec::new();

    if stats.min_price > 0.0 {
        let ratio = current.price_usd / stats.min_price;
        let proximity = ((ATL_FAR_FACTOR - ratio) / (ATL_FAR_FACTOR - ATL_NEAR_FACTOR))
            .clamp(0.0, 1.0);
        score += ATL_POINTS * proximity;
        if ratio <= ATL_NEAR_FACTOR {
            notes.push("at or near its all-time low".to_string());
        }
    } else if current.price_usd <= 0.0 {
        // The game has been free at some point and is free now.
        score += ATL_POINTS;
        notes.push("at or near its all-time low".to_string());
    }

    score += (current.cut_pct as f64 * DISCOUNT_POINTS_PER_PCT).min(DISCOUNT_POINTS_MAX);
    if current.cut_pct > 0 {
        notes.push(format!("currently {}% off", current.cut_pct));
    }

    if stats.avg_price > stats.min_price && current.price_usd < stats.avg_price {
        let rel = ((stats.avg_price - current.price_usd) / (stats.avg_price - stats.min_price))
            .clamp(0.0, 1.0);
        score += BELOW_AVG_POINTS * rel;
        notes.push("below its historical average".to_string());
    }

    if current.cut_pct == 0 && stats.avg_discount_when_on_sale > 0.0 {
        let strong_month = seasonal
            .iter()
            .find(|p| p.month == now.month())
            .map(|p| p.avg_discount >= SEASONAL_STRONG_FACTOR * stats.avg_discount_when_on_sale)
            .unwrap_or(false);
        if strong_month {
            score -= SEASONAL_PENALTY;
            notes.push("a deeper seasonal sale is typical this month".to_string());
        }
    }

    let score = score.clamp(0.0, 100.0);
    let signal = if score >= BUY_THRESHOLD {
        Signal::Buy
    } else {
        Signal::Wait
    };
    let records = stats.total_records as f64;
    let confidence = ((records / (records + CONFIDENCE_PIVOT)) * 100.0).round() / 100.0;

    let reason = match (signal, notes.is_empty()) {
        (Signal::Buy, false) => format!("Good time to buy: {}", notes.join(", ")),
        (Signal::Buy, true) => "Good time to buy".to_string(),
        (Signal::Wait, false) => format!("Better to wait: {}", notes.join(", ")),
        (Signal::Wait, true) => "Better to wait: the price is in its usual range".to_string(),
    };

    ScoredContext {
        prediction: Prediction {
            score,
            signal,
            reason,
            confidence,
        },
        context: PriceContext {
            current_price: current.price_usd,
            min_price_ever: stats.min_price,
            avg_price: stats.avg_price,
            current_discount_pct: current.cut_pct,
        },
    }
}
