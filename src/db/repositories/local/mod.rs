//! In-memory repository with an optional append-only journal.
//!
//! This is the default storage backend: all state lives in maps behind a
//! `parking_lot::RwLock`, which makes every operation safe under concurrent
//! sync jobs and readers. Durability is provided by a JSONL journal file
//! (one JSON object per accepted mutation) replayed on startup. Predictions
//! are a derived cache and are not journaled.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::api::{
    CachedPrediction, GameSummary, IngestOutcome, Signal, TopDeal, TopPrediction,
};
use crate::db::repository::{
    ErrorContext, GameStore, PredictionStore, PriceStore, RepositoryError, RepositoryResult,
};
use crate::models::{derive_cut_pct, Game, PriceRecord, RecordKey};

/// One line of the journal file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JournalEntry {
    Game(Game),
    Price(PriceRecord),
}

#[derive(Default)]
struct Inner {
    games: HashMap<String, Game>,
    appid_index: HashMap<u32, String>,
    /// Per-game history keyed by `(timestamp, shop_name)`, so iteration is
    /// already chronological.
    prices: HashMap<String, BTreeMap<RecordKey, PriceRecord>>,
    predictions: HashMap<String, CachedPrediction>,
}

impl Inner {
    /// Merge a game row: slug/title are refreshed, an existing appid is kept.
    /// Returns the row as stored.
    fn apply_game(&mut self, game: &Game) -> Game {
        let merged = match self.games.get(&game.id) {
            Some(existing) => Game {
                id: game.id.clone(),
                slug: game.slug.clone(),
                title: game.title.clone(),
                appid: existing.appid.or(game.appid),
            },
            None => game.clone(),
        };
        if let Some(appid) = merged.appid {
            self.appid_index.insert(appid, merged.id.clone());
        }
        self.games.insert(merged.id.clone(), merged.clone());
        merged
    }

    fn apply_price(&mut self, record: PriceRecord) {
        self.prices
            .entry(record.game_id.clone())
            .or_default()
            .insert(record.key(), record);
    }

    fn summary_for(&self, game: &Game) -> GameSummary {
        let history = self.prices.get(&game.id);
        let total_records = history.map(|h| h.len()).unwrap_or(0);
        let min_price = history
            .into_iter()
            .flat_map(|h| h.values())
            .map(|r| r.price_usd)
            .fold(f64::INFINITY, f64::min);
        let max_discount = history
            .into_iter()
            .flat_map(|h| h.values())
            .map(|r| r.cut_pct)
            .max()
            .unwrap_or(0);
        GameSummary {
            id: game.id.clone(),
            slug: game.slug.clone(),
            title: game.title.clone(),
            appid: game.appid,
            total_records,
            min_price: if min_price.is_finite() { min_price } else { 0.0 },
            max_discount,
        }
    }

    /// Latest record overall for one game, if it has any history.
    fn latest_record(&self, game_id: &str) -> Option<&PriceRecord> {
        self.prices
            .get(game_id)
            .and_then(|h| h.last_key_value())
            .map(|(_, rec)| rec)
    }
}

/// In-memory repository, optionally backed by an append-only JSONL journal.
pub struct LocalRepository {
    inner: RwLock<Inner>,
    journal: Option<Mutex<BufWriter<File>>>,
    journal_path: Option<PathBuf>,
}

impl LocalRepository {
    /// Create an empty, purely in-memory repository.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            journal: None,
            journal_path: None,
        }
    }

    /// Open a repository backed by a journal file, replaying any existing
    /// entries before accepting new writes.
    pub fn with_journal(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut inner = Inner::default();
        if path.exists() {
            replay_journal(&path, &mut inner)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                RepositoryError::storage_with_context(
                    e.to_string(),
                    ErrorContext::new("open_journal").with_details(path.display().to_string()),
                )
            })?;
        Ok(Self {
            inner: RwLock::new(inner),
            journal: Some(Mutex::new(BufWriter::new(file))),
            journal_path: Some(path),
        })
    }

    /// Path of the backing journal, if this repository is durable.
    pub fn journal_path(&self) -> Option<&Path> {
        self.journal_path.as_deref()
    }

    /// Append entries to the journal and flush. Called while holding the
    /// write lock so journal order matches application order.
    fn append_journal(&self, entries: &[JournalEntry]) -> RepositoryResult<()> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };
        let mut writer = journal.lock();
        for entry in entries {
            let line = serde_json::to_string(entry)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn replay_journal(path: &Path, inner: &mut Inner) -> RepositoryResult<()> {
    let file = File::open(path).map_err(|e| {
        RepositoryError::storage_with_context(
            e.to_string(),
            ErrorContext::new("replay_journal").with_details(path.display().to_string()),
        )
    })?;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: JournalEntry = serde_json::from_str(&line).map_err(|e| {
            RepositoryError::storage_with_context(
                format!("corrupt journal line {}: {}", line_no + 1, e),
                ErrorContext::new("replay_journal").with_details(path.display().to_string()),
            )
        })?;
        match entry {
            JournalEntry::Game(game) => {
                inner.apply_game(&game);
            }
            JournalEntry::Price(record) => inner.apply_price(record),
        }
    }
    Ok(())
}

#[async_trait]
impl GameStore for LocalRepository {
    async fn upsert_game(&self, game: &Game) -> RepositoryResult<()> {
        if game.id.is_empty() {
            return Err(RepositoryError::validation_with_context(
                "game id must not be empty",
                ErrorContext::new("upsert_game"),
            ));
        }
        let mut inner = self.inner.write();
        // Journal the merged row, not the input, so replay reproduces the
        // appid-keeping merge exactly.
        let merged = match inner.games.get(&game.id) {
            Some(existing) => Game {
                id: game.id.clone(),
                slug: game.slug.clone(),
                title: game.title.clone(),
                appid: existing.appid.or(game.appid),
            },
            None => game.clone(),
        };
        if inner.games.get(&game.id) != Some(&merged) {
            self.append_journal(&[JournalEntry::Game(merged.clone())])?;
        }
        inner.apply_game(&merged);
        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> RepositoryResult<Game> {
        self.inner.read().games.get(game_id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("game not found: {game_id}"),
                ErrorContext::new("get_game")
                    .with_entity("game")
                    .with_entity_id(game_id),
            )
        })
    }

    async fn get_game_by_appid(&self, appid: u32) -> RepositoryResult<Option<Game>> {
        let inner = self.inner.read();
        Ok(inner
            .appid_index
            .get(&appid)
            .and_then(|id| inner.games.get(id))
            .cloned())
    }

    async fn list_games(&self, limit: usize, offset: usize) -> RepositoryResult<Vec<GameSummary>> {
        let inner = self.inner.read();
        let mut summaries: Vec<GameSummary> =
            inner.games.values().map(|g| inner.summary_for(g)).collect();
        summaries.sort_by(|a, b| {
            b.total_records
                .cmp(&a.total_records)
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(summaries.into_iter().skip(offset).take(limit).collect())
    }

    async fn game_count(&self) -> RepositoryResult<usize> {
        Ok(self.inner.read().games.len())
    }
}

#[async_trait]
impl PriceStore for LocalRepository {
    async fn ingest(
        &self,
        game_id: &str,
        batch: Vec<PriceRecord>,
    ) -> RepositoryResult<IngestOutcome> {
        let mut inner = self.inner.write();
        if !inner.games.contains_key(game_id) {
            return Err(RepositoryError::not_found_with_context(
                format!("game not found: {game_id}"),
                ErrorContext::new("ingest")
                    .with_entity("game")
                    .with_entity_id(game_id),
            ));
        }

        // Validate the whole batch before touching anything: ingest is
        // all-or-nothing per batch.
        for record in &batch {
            if record.game_id != game_id {
                return Err(RepositoryError::validation_with_context(
                    format!(
                        "record game_id '{}' does not match batch game '{}'",
                        record.game_id, game_id
                    ),
                    ErrorContext::new("ingest").with_entity("price_record"),
                ));
            }
            if !record.price_usd.is_finite()
                || !record.regular_usd.is_finite()
                || record.price_usd < 0.0
                || record.regular_usd < 0.0
            {
                return Err(RepositoryError::validation_with_context(
                    format!(
                        "invalid prices ({}, {}) for {} at {}",
                        record.price_usd, record.regular_usd, record.shop_name, record.timestamp
                    ),
                    ErrorContext::new("ingest")
                        .with_entity("price_record")
                        .with_entity_id(game_id),
                ));
            }
        }

        // Collapse duplicate keys within the batch first (last write wins),
        // so the outcome counts never disagree with the stored state.
        let mut deduped: BTreeMap<RecordKey, PriceRecord> = BTreeMap::new();
        for mut record in batch {
            // Enforce the discount invariant regardless of upstream values.
            record.cut_pct = derive_cut_pct(record.price_usd, record.regular_usd);
            deduped.insert(record.key(), record);
        }

        let mut outcome = IngestOutcome::default();
        let mut accepted = Vec::new();
        let mut journal_lines = Vec::new();
        for (key, record) in deduped {
            match inner.prices.get(game_id).and_then(|h| h.get(&key)) {
                None => outcome.inserted += 1,
                Some(existing) if *existing != record => outcome.replaced += 1,
                // Identical record already stored: no state change, no journal.
                Some(_) => continue,
            }
            journal_lines.push(JournalEntry::Price(record.clone()));
            accepted.push(record);
        }

        self.append_journal(&journal_lines)?;
        for record in accepted {
            inner.apply_price(record);
        }
        Ok(outcome)
    }

    async fn history(
        &self,
        game_id: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Vec<PriceRecord>> {
        let inner = self.inner.read();
        if !inner.games.contains_key(game_id) {
            return Err(RepositoryError::not_found_with_context(
                format!("game not found: {game_id}"),
                ErrorContext::new("history")
                    .with_entity("game")
                    .with_entity_id(game_id),
            ));
        }
        let records = inner
            .prices
            .get(game_id)
            .into_iter()
            .flat_map(|h| h.values())
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .filter(|r| until.map_or(true, |u| r.timestamp <= u))
            .cloned()
            .collect();
        Ok(records)
    }

    async fn latest_prices(
        &self,
        game_id: &str,
    ) -> RepositoryResult<BTreeMap<String, PriceRecord>> {
        let inner = self.inner.read();
        if !inner.games.contains_key(game_id) {
            return Err(RepositoryError::not_found_with_context(
                format!("game not found: {game_id}"),
                ErrorContext::new("latest_prices")
                    .with_entity("game")
                    .with_entity_id(game_id),
            ));
        }
        let mut latest: BTreeMap<String, PriceRecord> = BTreeMap::new();
        for record in inner.prices.get(game_id).into_iter().flat_map(|h| h.values()) {
            match latest.get(&record.shop_name) {
                Some(existing) if existing.timestamp >= record.timestamp => {}
                _ => {
                    latest.insert(record.shop_name.clone(), record.clone());
                }
            }
        }
        Ok(latest)
    }

    async fn top_deals(&self, limit: usize) -> RepositoryResult<Vec<TopDeal>> {
        let inner = self.inner.read();
        let mut deals = Vec::new();
        for (game_id, history) in &inner.prices {
            let Some(game) = inner.games.get(game_id) else {
                continue;
            };
            let Some(latest) = history.last_key_value().map(|(_, r)| r) else {
                continue;
            };
            if latest.cut_pct == 0 {
                continue;
            }
            let min_price = history
                .values()
                .map(|r| r.price_usd)
                .fold(f64::INFINITY, f64::min);
            deals.push(TopDeal {
                id: game.id.clone(),
                title: game.title.clone(),
                appid: game.appid,
                slug: game.slug.clone(),
                current_price: latest.price_usd,
                regular_price: latest.regular_usd,
                discount_pct: latest.cut_pct,
                min_price: if min_price.is_finite() { min_price } else { latest.price_usd },
                last_seen: latest.timestamp,
            });
        }
        deals.sort_by(|a, b| {
            b.discount_pct
                .cmp(&a.discount_pct)
                .then_with(|| {
                    a.current_price
                        .partial_cmp(&b.current_price)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.title.cmp(&b.title))
        });
        deals.truncate(limit);
        Ok(deals)
    }

    async fn record_count(&self) -> RepositoryResult<usize> {
        Ok(self.inner.read().prices.values().map(|h| h.len()).sum())
    }
}

#[async_trait]
impl PredictionStore for LocalRepository {
    async fn cached_prediction(
        &self,
        game_id: &str,
    ) -> RepositoryResult<Option<CachedPrediction>> {
        Ok(self.inner.read().predictions.get(game_id).cloned())
    }

    async fn store_prediction(&self, entry: CachedPrediction) -> RepositoryResult<()> {
        self.inner
            .write()
            .predictions
            .insert(entry.game_id.clone(), entry);
        Ok(())
    }

    async fn signal_counts(&self) -> RepositoryResult<(usize, usize)> {
        let inner = self.inner.read();
        let buy = inner
            .predictions
            .values()
            .filter(|p| p.signal == Signal::Buy)
            .count();
        let wait = inner.predictions.len() - buy;
        Ok((buy, wait))
    }

    async fn top_predictions(
        &self,
        signal: Signal,
        limit: usize,
    ) -> RepositoryResult<Vec<TopPrediction>> {
        let inner = self.inner.read();
        let mut ranked = Vec::new();
        for entry in inner.predictions.values().filter(|p| p.signal == signal) {
            let Some(game) = inner.games.get(&entry.game_id) else {
                continue;
            };
            let latest = inner.latest_record(&entry.game_id);
            ranked.push(TopPrediction {
                id: game.id.clone(),
                title: game.title.clone(),
                appid: game.appid,
                current_price: latest.map(|r| r.price_usd).unwrap_or(0.0),
                discount_pct: latest.map(|r| r.cut_pct).unwrap_or(0),
                score: entry.score,
                signal: entry.signal,
                reason: entry.reason.clone(),
            });
        }
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}
