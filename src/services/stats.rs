//! Pure aggregation over a game's price history.
//!
//! Everything in this module is a deterministic function of the record set
//! passed in (plus an explicit `now` for age-based fields), so recomputing on
//! the same history always yields the same output.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};

use crate::api::{PriceStats, SeasonalPattern};
use crate::models::PriceRecord;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Mean of `cut_pct` over the records matching `filter`, rounded to one
/// decimal; 0 when nothing matches.
fn mean_cut<'a, F>(records: &'a [PriceRecord], filter: F) -> f64
where
    F: Fn(&&'a PriceRecord) -> bool,
{
    let cuts: Vec<f64> = records
        .iter()
        .filter(filter)
        .map(|r| r.cut_pct as f64)
        .collect();
    if cuts.is_empty() {
        return 0.0;
    }
    round1(cuts.iter().sum::<f64>() / cuts.len() as f64)
}

/// Summary statistics over a game's full history.
///
/// Records with `regular_usd = 0` never contribute to discount aggregates
/// (their `cut_pct` is forced to 0 at normalization) but still count toward
/// `total_records` and the price aggregates.
pub fn compute_stats(records: &[PriceRecord], now: DateTime<Utc>) -> PriceStats {
    if records.is_empty() {
        return PriceStats::empty();
    }

    let mut min_price = f64::INFINITY;
    let mut max_price = f64::NEG_INFINITY;
    let mut price_sum = 0.0;
    let mut first_seen = records[0].timestamp;
    let mut last_seen = records[0].timestamp;
    let mut min_price_first_at = records[0].timestamp;
    let mut max_discount = 0u8;

    for record in records {
        price_sum += record.price_usd;
        if record.price_usd < min_price {
            min_price = record.price_usd;
            min_price_first_at = record.timestamp;
        } else if record.price_usd == min_price && record.timestamp < min_price_first_at {
            min_price_first_at = record.timestamp;
        }
        max_price = max_price.max(record.price_usd);
        first_seen = first_seen.min(record.timestamp);
        last_seen = last_seen.max(record.timestamp);
        max_discount = max_discount.max(record.cut_pct);
    }

    // Rounding the mean could nudge it past an extremum for sub-cent prices.
    let avg_price = round2(price_sum / records.len() as f64).clamp(min_price, max_price);

    PriceStats {
        total_records: records.len(),
        first_seen: Some(first_seen),
        last_seen: Some(last_seen),
        min_price,
        max_price,
        avg_price,
        max_discount,
        avg_discount_when_on_sale: mean_cut(records, |r| r.cut_pct > 0),
        avg_cut_q4: mean_cut(records, |r| matches!(r.timestamp.month(), 11 | 12)),
        avg_cut_summer: mean_cut(records, |r| matches!(r.timestamp.month(), 6 | 7)),
        days_since_min_price: (now - min_price_first_at).num_days().max(0),
    }
}

/// Mean discount per calendar month, across all years, over discounted
/// records only. Months without a single discounted sample are omitted.
pub fn compute_seasonal_patterns(records: &[PriceRecord]) -> Vec<SeasonalPattern> {
    let mut by_month: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for record in records.iter().filter(|r| r.cut_pct > 0) {
        let entry = by_month.entry(record.timestamp.month()).or_insert((0.0, 0));
        entry.0 += record.cut_pct as f64;
        entry.1 += 1;
    }
    by_month
        .into_iter()
        .map(|(month, (sum, count))| SeasonalPattern {
            month,
            avg_discount: round1(sum / count as f64),
            sample_count: count,
        })
        .collect()
}
