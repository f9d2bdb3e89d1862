//! Background sync of price history from the upstream source.
//!
//! Sync is the only mutating operation visible from the HTTP surface. Every
//! variant (by appid, by catalog id, top-N ranking) runs as a background job:
//! the handler gets a job id back immediately and the processor logs progress
//! to the job tracker for polling/SSE.
//!
//! Records are ingested in chunks so that a failure mid-sync keeps the chunks
//! already committed; the report then carries a warning and the committed
//! count instead of discarding everything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::api::IngestOutcome;
use crate::db::checksum::calculate_checksum;
use crate::db::repository::FullRepository;
use crate::models::Game;
use crate::services::job_tracker::{JobKind, JobTracker, LogLevel};
use crate::upstream::PriceSource;

/// Records per ingest call; bounds how much work is lost on a mid-sync error.
pub const INGEST_CHUNK_SIZE: usize = 500;

/// Terminal state of one game's sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// History fetched and fully ingested.
    Ok,
    /// The upstream source does not know the requested game.
    NotFound,
    /// The game exists upstream but has no price history.
    NoHistory,
    /// Upstream payload identical to the previous sync; ingest skipped.
    Unchanged,
    /// Some chunks committed, then ingest failed; see `warnings`.
    Partial,
}

/// Result of syncing a single game.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<u32>,
    pub inserted: usize,
    pub replaced: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SyncReport {
    fn empty(status: SyncStatus) -> Self {
        Self {
            status,
            game_id: None,
            title: None,
            appid: None,
            inserted: 0,
            replaced: 0,
            warnings: Vec::new(),
        }
    }
}

/// Result of a top-N bulk sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub total_games: usize,
    pub total_inserted: usize,
    pub total_replaced: usize,
    pub errors: usize,
    pub synced: Vec<u32>,
}

/// Sync orchestrator: owns the upstream source, the job tracker, and the
/// per-game payload checksums used to skip unchanged ingests.
pub struct SyncService {
    repo: Arc<dyn FullRepository>,
    source: Arc<dyn PriceSource>,
    tracker: JobTracker,
    history_since: Option<chrono::DateTime<chrono::Utc>>,
    batch_size: usize,
    batch_delay: Duration,
    last_payload: Mutex<HashMap<String, String>>,
}

impl SyncService {
    pub fn new(
        repo: Arc<dyn FullRepository>,
        source: Arc<dyn PriceSource>,
        tracker: JobTracker,
        history_since: Option<chrono::DateTime<chrono::Utc>>,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            repo,
            source,
            tracker,
            history_since,
            batch_size: batch_size.max(1),
            batch_delay,
            last_payload: Mutex::new(HashMap::new()),
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Spawn a background sync by Steam appid; returns the job id.
    pub fn spawn_sync_by_appid(self: &Arc<Self>, appid: u32) -> String {
        let job_id = self.tracker.create_job(JobKind::SyncAppid);
        let service = Arc::clone(self);
        let id = job_id.clone();
        tokio::spawn(async move {
            let _ = service.sync_by_appid(&id, appid).await;
        });
        job_id
    }

    /// Spawn a background sync by catalog id; returns the job id.
    pub fn spawn_sync_by_game_id(self: &Arc<Self>, game_id: String) -> String {
        let job_id = self.tracker.create_job(JobKind::SyncGameId);
        let service = Arc::clone(self);
        let id = job_id.clone();
        tokio::spawn(async move {
            let _ = service.sync_by_game_id(&id, &game_id).await;
        });
        job_id
    }

    /// Spawn a background top-N bulk sync; returns the job id.
    pub fn spawn_sync_top(self: &Arc<Self>, top_n: usize) -> String {
        let job_id = self.tracker.create_job(JobKind::SyncTop);
        let service = Arc::clone(self);
        let id = job_id.clone();
        tokio::spawn(async move {
            let _ = service.sync_top(&id, top_n).await;
        });
        job_id
    }

    /// Sync one game by Steam appid, finalizing the job.
    pub async fn sync_by_appid(&self, job_id: &str, appid: u32) -> Result<SyncReport, String> {
        match self.run_appid(job_id, appid).await {
            Ok(report) => {
                self.tracker
                    .complete_job(job_id, serde_json::to_value(&report).ok());
                Ok(report)
            }
            Err(message) => {
                self.tracker.fail_job(job_id, &message);
                Err(message)
            }
        }
    }

    /// Sync one game by catalog id, finalizing the job.
    pub async fn sync_by_game_id(&self, job_id: &str, game_id: &str) -> Result<SyncReport, String> {
        match self.run_game_id(job_id, game_id).await {
            Ok(report) => {
                self.tracker
                    .complete_job(job_id, serde_json::to_value(&report).ok());
                Ok(report)
            }
            Err(message) => {
                self.tracker.fail_job(job_id, &message);
                Err(message)
            }
        }
    }

    /// Bulk sync of the N most popular games, finalizing the job.
    pub async fn sync_top(&self, job_id: &str, top_n: usize) -> Result<SyncSummary, String> {
        let appids = match self.source.top_appids(top_n).await {
            Ok(appids) => appids,
            Err(e) => {
                let message = format!("Ranking fetch failed: {e}");
                self.tracker.fail_job(job_id, &message);
                return Err(message);
            }
        };
        self.tracker.log(
            job_id,
            LogLevel::Info,
            format!("Syncing {} games...", appids.len()),
        );

        let mut summary = SyncSummary::default();
        let total = appids.len();
        let mut processed = 0usize;
        for batch in appids.chunks(self.batch_size) {
            for &appid in batch {
                match self.run_appid(job_id, appid).await {
                    Ok(report) if report.status == SyncStatus::Ok => {
                        summary.total_games += 1;
                        summary.total_inserted += report.inserted;
                        summary.total_replaced += report.replaced;
                        summary.synced.push(appid);
                    }
                    Ok(_) => summary.errors += 1,
                    Err(_) => summary.errors += 1,
                }
                processed += 1;
            }
            self.tracker.log(
                job_id,
                LogLevel::Info,
                format!(
                    "Progress: {processed}/{total} | Inserted: {}",
                    summary.total_inserted
                ),
            );
            if processed < total {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        info!(
            games = summary.total_games,
            inserted = summary.total_inserted,
            errors = summary.errors,
            "bulk sync finished"
        );
        self.tracker
            .complete_job(job_id, serde_json::to_value(&summary).ok());
        Ok(summary)
    }

    async fn run_appid(&self, job_id: &str, appid: u32) -> Result<SyncReport, String> {
        self.tracker.log(
            job_id,
            LogLevel::Info,
            format!("Looking up appid {appid}..."),
        );
        let lookup = self
            .source
            .lookup_appid(appid)
            .await
            .map_err(|e| format!("Upstream lookup failed for appid {appid}: {e}"))?;
        let Some(game_ref) = lookup else {
            self.tracker.log(
                job_id,
                LogLevel::Warning,
                format!("appid {appid} not found upstream"),
            );
            let mut report = SyncReport::empty(SyncStatus::NotFound);
            report.appid = Some(appid);
            return Ok(report);
        };
        let game = Game::new(game_ref.id, game_ref.slug, game_ref.title).with_appid(appid);
        self.run_game(job_id, game).await
    }

    async fn run_game_id(&self, job_id: &str, game_id: &str) -> Result<SyncReport, String> {
        // The id usually comes from a search hit, so the game may not be in
        // the store yet. Resolve metadata when the source knows it, fall back
        // to a placeholder row otherwise; the next sync fills it in.
        let game = match self.repo.get_game(game_id).await {
            Ok(game) => game,
            Err(e) if e.is_not_found() => match self.source.game_info(game_id).await {
                Ok(Some(game_ref)) => Game::new(game_ref.id, game_ref.slug, game_ref.title),
                Ok(None) => Game::placeholder(game_id),
                Err(_) => Game::placeholder(game_id),
            },
            Err(e) => return Err(format!("Repository error: {e}")),
        };
        self.run_game(job_id, game).await
    }

    async fn run_game(&self, job_id: &str, game: Game) -> Result<SyncReport, String> {
        self.repo
            .upsert_game(&game)
            .await
            .map_err(|e| format!("Failed to store game {}: {e}", game.id))?;

        self.tracker.log(
            job_id,
            LogLevel::Info,
            format!("Fetching price history for {}...", game.title),
        );
        let records = self
            .source
            .price_history(&game.id, game.appid, self.history_since)
            .await
            .map_err(|e| format!("Upstream history fetch failed for {}: {e}", game.id))?;

        if records.is_empty() {
            self.tracker.log(
                job_id,
                LogLevel::Warning,
                format!("No price history upstream for {}", game.title),
            );
            let mut report = SyncReport::empty(SyncStatus::NoHistory);
            report.game_id = Some(game.id);
            report.title = Some(game.title);
            report.appid = game.appid;
            return Ok(report);
        }

        let payload = serde_json::to_string(&records)
            .map_err(|e| format!("Could not serialize payload for {}: {e}", game.id))?;
        let checksum = calculate_checksum(&payload);
        self.tracker.log(
            job_id,
            LogLevel::Info,
            format!(
                "Fetched {} records (payload {})",
                records.len(),
                &checksum[..12]
            ),
        );
        if self.last_payload.lock().get(&game.id) == Some(&checksum) {
            self.tracker.log(
                job_id,
                LogLevel::Info,
                "No changes upstream, skipping ingest",
            );
            let mut report = SyncReport::empty(SyncStatus::Unchanged);
            report.game_id = Some(game.id);
            report.title = Some(game.title);
            report.appid = game.appid;
            return Ok(report);
        }

        let total = records.len();
        let mut outcome = IngestOutcome::default();
        let mut warnings = Vec::new();
        for chunk in records.chunks(INGEST_CHUNK_SIZE) {
            match self.repo.ingest(&game.id, chunk.to_vec()).await {
                Ok(chunk_outcome) => outcome.merge(chunk_outcome),
                Err(e) => {
                    // Chunks already ingested stay committed; report the
                    // partial progress instead of discarding it.
                    let committed = outcome.inserted + outcome.replaced;
                    let message =
                        format!("Ingest failed after {committed} committed records: {e}");
                    self.tracker.log(job_id, LogLevel::Warning, &message);
                    warnings.push(message);
                    break;
                }
            }
        }

        let status = if warnings.is_empty() {
            self.last_payload.lock().insert(game.id.clone(), checksum);
            SyncStatus::Ok
        } else {
            SyncStatus::Partial
        };
        if status == SyncStatus::Ok {
            self.tracker.log(
                job_id,
                LogLevel::Success,
                format!(
                    "{}: {} new records ({} of {} total refreshed)",
                    game.title,
                    outcome.inserted,
                    outcome.inserted + outcome.replaced,
                    total
                ),
            );
        }
        info!(
            game_id = %game.id,
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            "sync finished"
        );

        Ok(SyncReport {
            status,
            game_id: Some(game.id),
            title: Some(game.title),
            appid: game.appid,
            inserted: outcome.inserted,
            replaced: outcome.replaced,
            warnings,
        })
    }
}
