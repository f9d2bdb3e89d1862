//! Public API surface for the backend.
//!
//! This file consolidates the derived/view types shared by the service layer
//! and the HTTP API. All types derive Serialize/Deserialize for JSON
//! serialization. Domain entities owned by the store live in
//! [`crate::models`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PriceRecord;

/// Summary statistics over a game's full price history.
///
/// Derived, never stored. All fields are zero when `total_records == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub total_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub max_discount: u8,
    /// Mean `cut_pct` over records that were actually on sale (`cut_pct > 0`).
    pub avg_discount_when_on_sale: f64,
    /// Mean `cut_pct` over records falling in November/December.
    pub avg_cut_q4: f64,
    /// Mean `cut_pct` over records falling in June/July.
    pub avg_cut_summer: f64,
    /// Days since the all-time-low price was first observed.
    pub days_since_min_price: i64,
}

impl PriceStats {
    /// Stats for a game with no recorded history.
    pub fn empty() -> Self {
        Self {
            total_records: 0,
            first_seen: None,
            last_seen: None,
            min_price: 0.0,
            max_price: 0.0,
            avg_price: 0.0,
            max_discount: 0,
            avg_discount_when_on_sale: 0.0,
            avg_cut_q4: 0.0,
            avg_cut_summer: 0.0,
            days_since_min_price: 0,
        }
    }
}

/// Mean discount for one calendar month across all observed years.
///
/// Only months with at least one discounted sample are emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPattern {
    /// Calendar month, 1-12.
    pub month: u32,
    pub avg_discount: f64,
    pub sample_count: usize,
}

/// The BUY/WAIT classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "WAIT")]
    Wait,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Wait => write!(f, "WAIT"),
        }
    }
}

/// A scored buy/wait classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 0-100, higher means a better moment to buy.
    pub score: f64,
    pub signal: Signal,
    pub reason: String,
    /// 0-1, grows with the amount of supporting history.
    pub confidence: f64,
}

/// Price context the prediction was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceContext {
    pub current_price: f64,
    pub min_price_ever: f64,
    pub avg_price: f64,
    pub current_discount_pct: u8,
}

/// Full prediction payload served to the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionView {
    pub game_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<u32>,
    pub prediction: Prediction,
    pub price_context: PriceContext,
    pub from_cache: bool,
}

/// Outcome of a prediction request, as explicit tagged variants rather than
/// nullable fields.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    /// A prediction is available (freshly computed or cached).
    Ready(PredictionView),
    /// The game exists but has too little history to classify.
    Pending { records: usize, required: usize },
    /// The game is not known to the store.
    NotFound,
}

/// Cached prediction entry, keyed by game id in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPrediction {
    pub game_id: String,
    pub score: f64,
    pub signal: Signal,
    pub reason: String,
    pub confidence: f64,
    pub price_context: PriceContext,
    pub computed_at: DateTime<Utc>,
}

/// One game in the paginated list view, with denormalized record summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<u32>,
    pub total_records: usize,
    pub min_price: f64,
    pub max_discount: u8,
}

/// One entry of the top-discounts dashboard listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopDeal {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<u32>,
    pub slug: String,
    pub current_price: f64,
    pub regular_price: f64,
    pub discount_pct: u8,
    pub min_price: f64,
    pub last_seen: DateTime<Utc>,
}

/// One entry of the top buy-signal listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPrediction {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<u32>,
    pub current_price: f64,
    pub discount_pct: u8,
    pub score: f64,
    pub signal: Signal,
    pub reason: String,
}

/// Global dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OverviewStats {
    pub total_games: usize,
    pub total_records: usize,
    pub buy_signals: usize,
    pub wait_signals: usize,
}

/// Result of one ingest batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Records with a previously unseen `(shop, timestamp)` key.
    pub inserted: usize,
    /// Records that overwrote an existing key (last write wins).
    pub replaced: usize,
}

impl IngestOutcome {
    pub fn merge(&mut self, other: IngestOutcome) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
    }
}

/// A single point of a game's price history as served over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price_usd: f64,
    pub regular_usd: f64,
    pub cut_pct: u8,
    pub shop_name: String,
}

impl From<PriceRecord> for PricePoint {
    fn from(rec: PriceRecord) -> Self {
        Self {
            timestamp: rec.timestamp,
            price_usd: rec.price_usd,
            regular_usd: rec.regular_usd,
            cut_pct: rec.cut_pct,
            shop_name: rec.shop_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Signal::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&Signal::Wait).unwrap(), "\"WAIT\"");
    }

    #[test]
    fn test_ingest_outcome_merge() {
        let mut a = IngestOutcome {
            inserted: 2,
            replaced: 1,
        };
        a.merge(IngestOutcome {
            inserted: 3,
            replaced: 0,
        });
        assert_eq!(a.inserted, 5);
        assert_eq!(a.replaced, 1);
    }

    #[test]
    fn test_empty_stats_are_zeroed() {
        let stats = PriceStats::empty();
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.min_price, 0.0);
        assert!(stats.first_seen.is_none());
    }
}
