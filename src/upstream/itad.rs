//! HTTP client for the IsThereAnyDeal-style price API.
//!
//! Handles authentication, retry with backoff on rate limits, and parsing of
//! the loosely-shaped history/prices payloads into normalized records.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{GameRef, PriceSource, SearchHit, ShopPrice, SourceError, SourceResult};
use crate::config::Settings;
use crate::models::{derive_cut_pct, parse_timestamp, PriceRecord};

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_SHOP_NAME: &str = "Steam";

/// Async client for the upstream price API.
pub struct ItadClient {
    http: reqwest::Client,
    base_url: String,
    ranking_url: String,
    api_key: String,
    country: String,
}

impl ItadClient {
    /// Build a client from settings. Fails when no API key is configured;
    /// the caller decides whether that is fatal (sync) or a fallback case
    /// (live price reads).
    pub fn from_settings(settings: &Settings) -> SourceResult<Self> {
        let api_key = settings
            .itad_api_key
            .clone()
            .ok_or_else(|| SourceError::Unconfigured("ITAD_API_KEY is not set".to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.itad_base_url.clone(),
            ranking_url: settings.ranking_url.clone(),
            api_key,
            country: settings.itad_country.clone(),
        })
    }

    /// GET with the API key attached and exponential backoff on 429.
    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> SourceResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut query: Vec<(&str, String)> = vec![("key", self.api_key.clone())];
        query.extend_from_slice(params);

        for attempt in 0..MAX_ATTEMPTS {
            let response = match self.http.get(&url).query(&query).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!(path, attempt, "upstream request timed out, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match response.status().as_u16() {
                200 => {
                    return response.json::<Value>().await.map_err(|e| {
                        SourceError::Decode {
                            path: path.to_string(),
                            message: e.to_string(),
                        }
                    })
                }
                429 => {
                    let wait = 2u64.pow(attempt);
                    warn!(path, wait, "rate limit hit, backing off");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                status => {
                    debug!(path, status, "upstream returned non-success status");
                    return Err(SourceError::Status {
                        status,
                        path: path.to_string(),
                    });
                }
            }
        }
        Err(SourceError::Exhausted {
            path: path.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    found: bool,
    game: Option<GameRef>,
}

#[async_trait]
impl PriceSource for ItadClient {
    async fn lookup_appid(&self, appid: u32) -> SourceResult<Option<GameRef>> {
        let data = self
            .get_json("/games/lookup/v1", &[("appid", appid.to_string())])
            .await?;
        let lookup: LookupResponse =
            serde_json::from_value(data).map_err(|e| SourceError::Decode {
                path: "/games/lookup/v1".to_string(),
                message: e.to_string(),
            })?;
        Ok(if lookup.found { lookup.game } else { None })
    }

    async fn game_info(&self, game_id: &str) -> SourceResult<Option<GameRef>> {
        let data = self
            .get_json("/games/info/v2", &[("id", game_id.to_string())])
            .await?;
        // The payload is either the object itself or a one-element list.
        let item = match &data {
            Value::Array(items) => items.first(),
            Value::Object(_) => Some(&data),
            _ => None,
        };
        Ok(item.map(|item| GameRef {
            id: game_id.to_string(),
            slug: item
                .get("slug")
                .and_then(Value::as_str)
                .unwrap_or(game_id)
                .to_string(),
            title: item
                .get("title")
                .or_else(|| item.get("name"))
                .and_then(Value::as_str)
                .unwrap_or(game_id)
                .to_string(),
        }))
    }

    async fn price_history(
        &self,
        game_id: &str,
        _appid: Option<u32>,
        since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<PriceRecord>> {
        let mut params = vec![
            ("id", game_id.to_string()),
            ("country", self.country.clone()),
        ];
        if let Some(since) = since {
            params.push(("since", since.to_rfc3339()));
        }
        let data = self.get_json("/games/history/v2", &params).await?;
        let records = parse_history(game_id, &data);
        debug!(game_id, count = records.len(), "parsed upstream history");
        Ok(records)
    }

    async fn search(&self, query: &str, limit: usize) -> SourceResult<Vec<SearchHit>> {
        let data = self
            .get_json(
                "/games/search/v1",
                &[("title", query.to_string()), ("results", limit.to_string())],
            )
            .await?;
        let mut hits = Vec::new();
        if let Value::Array(items) = data {
            for item in items {
                // Skip entries the API shaped differently rather than failing
                // the whole search.
                if let Ok(hit) = serde_json::from_value::<SearchHit>(item) {
                    hits.push(hit);
                }
            }
        }
        Ok(hits)
    }

    async fn current_prices(&self, game_id: &str) -> SourceResult<BTreeMap<String, ShopPrice>> {
        let data = self
            .get_json(
                "/games/prices/v3",
                &[
                    ("id", game_id.to_string()),
                    ("country", self.country.clone()),
                ],
            )
            .await?;
        Ok(parse_current_prices(&data))
    }

    async fn top_appids(&self, limit: usize) -> SourceResult<Vec<u32>> {
        let response = self
            .http
            .get(&self.ranking_url)
            .query(&[("request", "top100forever")])
            .send()
            .await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(SourceError::Status {
                status,
                path: self.ranking_url.clone(),
            });
        }
        let data: Value = response.json().await.map_err(|e| SourceError::Decode {
            path: self.ranking_url.clone(),
            message: e.to_string(),
        })?;
        let mut appids: Vec<u32> = data
            .as_object()
            .map(|map| map.keys().filter_map(|k| k.parse().ok()).collect())
            .unwrap_or_default();
        appids.truncate(limit);
        Ok(appids)
    }
}

/// Parse the history payload: either a bare list of price events or an
/// object with a `prices` list. Entries that cannot be parsed are skipped.
fn parse_history(game_id: &str, data: &Value) -> Vec<PriceRecord> {
    let entries: &[Value] = match data.as_array() {
        Some(items) => items,
        None => data
            .get("prices")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(timestamp) = entry
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|raw| parse_timestamp(raw).ok())
        else {
            continue;
        };
        let deal = entry.get("deal").unwrap_or(entry);
        let price = amount_of(deal, entry, "price");
        let regular = amount_of(deal, entry, "regular");
        let shop = entry.get("shop");
        let shop_id = shop
            .and_then(|s| s.get("id"))
            .and_then(Value::as_u64)
            .map(|id| id as u32);
        let shop_name = shop
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SHOP_NAME);
        records.push(PriceRecord::normalized(
            game_id, shop_id, shop_name, timestamp, price, regular,
        ));
    }
    records
}

/// `deal.{field}.amount` with a fallback to `entry.{field}.amount`.
fn amount_of(deal: &Value, entry: &Value, field: &str) -> f64 {
    deal.get(field)
        .and_then(|v| v.get("amount"))
        .and_then(Value::as_f64)
        .or_else(|| {
            entry
                .get(field)
                .and_then(|v| v.get("amount"))
                .and_then(Value::as_f64)
        })
        .unwrap_or(0.0)
}

/// Parse the live prices payload: a list of `{id, deals: [...]}` objects.
fn parse_current_prices(data: &Value) -> BTreeMap<String, ShopPrice> {
    let mut prices = BTreeMap::new();
    let games: &[Value] = data.as_array().map(Vec::as_slice).unwrap_or(&[]);
    for game in games {
        let deals: &[Value] = game
            .get("deals")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for deal in deals {
            let Some(shop_name) = deal
                .get("shop")
                .and_then(|s| s.get("name"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            let price = deal
                .get("price")
                .and_then(|v| v.get("amount"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let regular = deal
                .get("regular")
                .and_then(|v| v.get("amount"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let timestamp = deal
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|raw| parse_timestamp(raw).ok());
            prices.insert(
                shop_name.to_string(),
                ShopPrice {
                    price_usd: price,
                    regular_usd: regular,
                    cut_pct: derive_cut_pct(price, regular),
                    timestamp,
                },
            );
        }
    }
    prices
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_history_list_shape() {
        let data = json!([
            {
                "timestamp": "2024-03-01T00:00:00Z",
                "deal": {
                    "price": {"amount": 9.99},
                    "regular": {"amount": 19.99},
                    "cut": 50
                },
                "shop": {"id": 61, "name": "Steam"}
            },
            {
                "timestamp": "not a date",
                "deal": {"price": {"amount": 1.0}, "regular": {"amount": 2.0}}
            }
        ]);
        let records = parse_history("g1", &data);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shop_name, "Steam");
        assert_eq!(records[0].shop_id, Some(61));
        assert_eq!(records[0].price_usd, 9.99);
        // Derived from amounts, not taken from the payload's `cut` field.
        assert_eq!(records[0].cut_pct, 50);
    }

    #[test]
    fn test_parse_history_object_shape() {
        let data = json!({
            "prices": [
                {
                    "timestamp": "2024-03-01T00:00:00Z",
                    "price": {"amount": 5.0},
                    "regular": {"amount": 10.0}
                }
            ]
        });
        let records = parse_history("g1", &data);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cut_pct, 50);
        assert_eq!(records[0].shop_name, DEFAULT_SHOP_NAME);
    }

    #[test]
    fn test_parse_current_prices() {
        let data = json!([
            {
                "id": "g1",
                "deals": [
                    {
                        "shop": {"id": 61, "name": "Steam"},
                        "price": {"amount": 7.49},
                        "regular": {"amount": 29.99},
                        "timestamp": "2024-05-01T00:00:00Z"
                    },
                    {
                        "shop": {"id": 16, "name": "GOG"},
                        "price": {"amount": 8.99},
                        "regular": {"amount": 29.99}
                    }
                ]
            }
        ]);
        let prices = parse_current_prices(&data);
        assert_eq!(prices.len(), 2);
        assert_eq!(prices["Steam"].cut_pct, 75);
        assert!(prices["GOG"].timestamp.is_none());
    }
}
