//! Shared helpers for integration tests: record builders and a stub
//! upstream source with canned responses.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use steamsense::models::PriceRecord;
use steamsense::upstream::{
    GameRef, PriceSource, SearchHit, ShopPrice, SourceError, SourceResult,
};

pub fn ts(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn record(game_id: &str, month: u32, day: u32, price: f64, regular: f64) -> PriceRecord {
    PriceRecord::normalized(game_id, Some(61), "Steam", ts(2024, month, day), price, regular)
}

pub fn shop_record(
    game_id: &str,
    shop: &str,
    month: u32,
    day: u32,
    price: f64,
    regular: f64,
) -> PriceRecord {
    PriceRecord::normalized(game_id, None, shop, ts(2024, month, day), price, regular)
}

/// Upstream source with canned responses, for driving the sync processor
/// without a network.
#[derive(Default)]
pub struct StubSource {
    pub lookup: HashMap<u32, GameRef>,
    pub info: HashMap<String, GameRef>,
    pub history: HashMap<String, Vec<PriceRecord>>,
    pub ranking: Vec<u32>,
    pub history_calls: AtomicUsize,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game(mut self, appid: u32, id: &str, title: &str) -> Self {
        let game_ref = GameRef {
            id: id.to_string(),
            slug: id.to_string(),
            title: title.to_string(),
        };
        self.lookup.insert(appid, game_ref.clone());
        self.info.insert(id.to_string(), game_ref);
        self
    }

    pub fn with_history(mut self, id: &str, records: Vec<PriceRecord>) -> Self {
        self.history.insert(id.to_string(), records);
        self
    }

    pub fn with_ranking(mut self, appids: Vec<u32>) -> Self {
        self.ranking = appids;
        self
    }
}

#[async_trait]
impl PriceSource for StubSource {
    async fn lookup_appid(&self, appid: u32) -> SourceResult<Option<GameRef>> {
        Ok(self.lookup.get(&appid).cloned())
    }

    async fn game_info(&self, game_id: &str) -> SourceResult<Option<GameRef>> {
        Ok(self.info.get(game_id).cloned())
    }

    async fn price_history(
        &self,
        game_id: &str,
        _appid: Option<u32>,
        _since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<PriceRecord>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.history.get(game_id).cloned().unwrap_or_default())
    }

    async fn search(&self, _query: &str, _limit: usize) -> SourceResult<Vec<SearchHit>> {
        Ok(vec![])
    }

    async fn current_prices(&self, _game_id: &str) -> SourceResult<BTreeMap<String, ShopPrice>> {
        Ok(BTreeMap::new())
    }

    async fn top_appids(&self, limit: usize) -> SourceResult<Vec<u32>> {
        Ok(self.ranking.iter().copied().take(limit).collect())
    }
}

/// Source whose every call fails, for exercising upstream failure paths.
pub struct FailingSource;

#[async_trait]
impl PriceSource for FailingSource {
    async fn lookup_appid(&self, _appid: u32) -> SourceResult<Option<GameRef>> {
        Err(SourceError::Status {
            status: 503,
            path: "/games/lookup/v1".to_string(),
        })
    }

    async fn game_info(&self, _game_id: &str) -> SourceResult<Option<GameRef>> {
        Err(SourceError::Status {
            status: 503,
            path: "/games/info/v2".to_string(),
        })
    }

    async fn price_history(
        &self,
        _game_id: &str,
        _appid: Option<u32>,
        _since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<PriceRecord>> {
        Err(SourceError::Status {
            status: 503,
            path: "/games/history/v2".to_string(),
        })
    }

    async fn search(&self, _query: &str, _limit: usize) -> SourceResult<Vec<SearchHit>> {
        Err(SourceError::Status {
            status: 503,
            path: "/games/search/v1".to_string(),
        })
    }

    async fn current_prices(&self, _game_id: &str) -> SourceResult<BTreeMap<String, ShopPrice>> {
        Err(SourceError::Status {
            status: 503,
            path: "/games/prices/v3".to_string(),
        })
    }

    async fn top_appids(&self, _limit: usize) -> SourceResult<Vec<u32>> {
        Err(SourceError::Status {
            status: 503,
            path: "steamspy".to_string(),
        })
    }
}
