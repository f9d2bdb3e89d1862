//! Domain entities for the price-tracking core.
//!
//! These are the types owned by the price record store: games known to the
//! system and the immutable price observations collected for them. Derived
//! views (stats, predictions) live in [`crate::api`].

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A game tracked by the system.
///
/// `id` is the upstream catalog identifier (a stable string), `appid` the
/// optional Steam application id. `slug` and `title` are refreshed on every
/// sync; `appid` is filled once and never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<u32>,
}

impl Game {
    pub fn new(id: impl Into<String>, slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            title: title.into(),
            appid: None,
        }
    }

    pub fn with_appid(mut self, appid: u32) -> Self {
        self.appid = Some(appid);
        self
    }

    /// Placeholder row for a catalog id we have not resolved yet.
    /// Slug and title fall back to the id until the next sync fills them in.
    pub fn placeholder(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            slug: id.clone(),
            title: id.clone(),
            id,
            appid: None,
        }
    }
}

/// A single immutable price observation.
///
/// Records are append-only and keyed by `(game_id, shop_name, timestamp)`.
/// `cut_pct` is always recomputed from `price_usd`/`regular_usd` at
/// construction time; upstream discount values are not trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub game_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<u32>,
    pub shop_name: String,
    pub timestamp: DateTime<Utc>,
    pub price_usd: f64,
    pub regular_usd: f64,
    pub cut_pct: u8,
}

impl PriceRecord {
    /// Build a record with the discount percentage derived from the prices:
    /// `round(100 * (1 - price/regular))` when `regular > 0`, else `0`.
    pub fn normalized(
        game_id: impl Into<String>,
        shop_id: Option<u32>,
        shop_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        price_usd: f64,
        regular_usd: f64,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            shop_id,
            shop_name: shop_name.into(),
            timestamp,
            price_usd,
            regular_usd,
            cut_pct: derive_cut_pct(price_usd, regular_usd),
        }
    }

    /// Deduplication key within one game's history.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            timestamp: self.timestamp,
            shop_name: self.shop_name.clone(),
        }
    }
}

/// Identity of a price record within a game: `(timestamp, shop_name)`.
///
/// Ordered by timestamp first so a `BTreeMap<RecordKey, _>` iterates a
/// game's history in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub timestamp: DateTime<Utc>,
    pub shop_name: String,
}

/// Discount percentage for a price/regular pair.
///
/// Negative discounts (price above regular) clamp to zero, as does a zero or
/// negative regular price.
pub fn derive_cut_pct(price_usd: f64, regular_usd: f64) -> u8 {
    if regular_usd <= 0.0 {
        return 0;
    }
    let cut = (100.0 * (1.0 - price_usd / regular_usd)).round();
    cut.clamp(0.0, 100.0) as u8
}

/// Parse a user-supplied timestamp: RFC 3339 first, then a bare
/// `YYYY-MM-DD` date interpreted as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)));
    }
    Err(format!(
        "invalid timestamp '{raw}' (expected RFC 3339 or YYYY-MM-DD)"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_pct_basic() {
        assert_eq!(derive_cut_pct(6.0, 10.0), 40);
        assert_eq!(derive_cut_pct(10.0, 10.0), 0);
        assert_eq!(derive_cut_pct(0.0, 10.0), 100);
    }

    #[test]
    fn test_cut_pct_zero_regular() {
        assert_eq!(derive_cut_pct(5.0, 0.0), 0);
        assert_eq!(derive_cut_pct(5.0, -1.0), 0);
    }

    #[test]
    fn test_cut_pct_price_above_regular_clamps() {
        assert_eq!(derive_cut_pct(12.0, 10.0), 0);
    }

    #[test]
    fn test_normalized_ignores_upstream_cut() {
        let rec = PriceRecord::normalized("g1", Some(61), "Steam", Utc::now(), 7.5, 30.0);
        assert_eq!(rec.cut_pct, 75);
    }

    #[test]
    fn test_record_key_orders_by_timestamp() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let a = RecordKey {
            timestamp: early,
            shop_name: "Zed Store".to_string(),
        };
        let b = RecordKey {
            timestamp: late,
            shop_name: "Alpha Store".to_string(),
        };
        assert!(a < b);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01T12:00:00Z").is_ok());
        let midnight = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
