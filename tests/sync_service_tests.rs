//! Tests for the sync processor against a stub upstream source.

mod support;

use std::sync::Arc;
use std::time::Duration;

use steamsense::db::repositories::LocalRepository;
use steamsense::db::repository::{FullRepository, GameStore, PriceStore};
use steamsense::services::job_tracker::{JobKind, JobStatus, JobTracker};
use steamsense::services::sync::{SyncService, SyncStatus};
use support::{record, FailingSource, StubSource};

fn service(repo: Arc<dyn FullRepository>, source: Arc<dyn steamsense::upstream::PriceSource>) -> SyncService {
    SyncService::new(
        repo,
        source,
        JobTracker::new(),
        None,
        10,
        Duration::from_millis(0),
    )
}

fn three_records(game_id: &str) -> Vec<steamsense::models::PriceRecord> {
    vec![
        record(game_id, 1, 1, 10.0, 10.0),
        record(game_id, 2, 1, 8.0, 10.0),
        record(game_id, 3, 1, 6.0, 10.0),
    ]
}

#[tokio::test]
async fn test_sync_by_appid_ingests_history() {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    let source = Arc::new(
        StubSource::new()
            .with_game(620, "portal-2", "Portal 2")
            .with_history("portal-2", three_records("portal-2")),
    );
    let sync = service(Arc::clone(&repo), source);

    let job_id = sync.tracker().create_job(JobKind::SyncAppid);
    let report = sync.sync_by_appid(&job_id, 620).await.unwrap();

    assert_eq!(report.status, SyncStatus::Ok);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.title.as_deref(), Some("Portal 2"));

    let game = repo.get_game("portal-2").await.unwrap();
    assert_eq!(game.appid, Some(620));
    assert_eq!(repo.history("portal-2", None, None).await.unwrap().len(), 3);

    let job = sync.tracker().get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.result.is_some());
}

#[tokio::test]
async fn test_second_identical_sync_inserts_nothing() {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    let source = Arc::new(
        StubSource::new()
            .with_game(620, "portal-2", "Portal 2")
            .with_history("portal-2", three_records("portal-2")),
    );
    let sync = service(Arc::clone(&repo), source);

    let first_job = sync.tracker().create_job(JobKind::SyncAppid);
    let first = sync.sync_by_appid(&first_job, 620).await.unwrap();
    assert_eq!(first.inserted, 3);

    let second_job = sync.tracker().create_job(JobKind::SyncAppid);
    let second = sync.sync_by_appid(&second_job, 620).await.unwrap();
    // The payload checksum short-circuits the second ingest entirely.
    assert_eq!(second.status, SyncStatus::Unchanged);
    assert_eq!(second.inserted, 0);
    assert_eq!(repo.record_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_sync_unknown_appid_reports_not_found() {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    let sync = service(Arc::clone(&repo), Arc::new(StubSource::new()));

    let job_id = sync.tracker().create_job(JobKind::SyncAppid);
    let report = sync.sync_by_appid(&job_id, 999).await.unwrap();
    assert_eq!(report.status, SyncStatus::NotFound);
    assert_eq!(report.inserted, 0);
    assert_eq!(repo.game_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sync_game_without_history() {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    let source = Arc::new(StubSource::new().with_game(620, "portal-2", "Portal 2"));
    let sync = service(Arc::clone(&repo), source);

    let job_id = sync.tracker().create_job(JobKind::SyncAppid);
    let report = sync.sync_by_appid(&job_id, 620).await.unwrap();
    assert_eq!(report.status, SyncStatus::NoHistory);
    // The game row itself is still created.
    assert!(repo.get_game("portal-2").await.is_ok());
}

#[tokio::test]
async fn test_sync_by_game_id_resolves_metadata() {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    let source = Arc::new(
        StubSource::new()
            .with_game(620, "portal-2", "Portal 2")
            .with_history("portal-2", three_records("portal-2")),
    );
    let sync = service(Arc::clone(&repo), source);

    let job_id = sync.tracker().create_job(JobKind::SyncGameId);
    let report = sync.sync_by_game_id(&job_id, "portal-2").await.unwrap();
    assert_eq!(report.status, SyncStatus::Ok);

    let game = repo.get_game("portal-2").await.unwrap();
    assert_eq!(game.title, "Portal 2");
}

#[tokio::test]
async fn test_sync_by_unknown_game_id_creates_placeholder() {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    let source = Arc::new(
        StubSource::new().with_history("mystery-id", three_records("mystery-id")),
    );
    let sync = service(Arc::clone(&repo), source);

    let job_id = sync.tracker().create_job(JobKind::SyncGameId);
    let report = sync.sync_by_game_id(&job_id, "mystery-id").await.unwrap();
    assert_eq!(report.status, SyncStatus::Ok);

    // No metadata upstream: the row falls back to the id.
    let game = repo.get_game("mystery-id").await.unwrap();
    assert_eq!(game.title, "mystery-id");
    assert_eq!(game.slug, "mystery-id");
}

#[tokio::test]
async fn test_sync_upstream_failure_fails_job_without_corruption() {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    let sync = service(Arc::clone(&repo), Arc::new(FailingSource));

    let job_id = sync.tracker().create_job(JobKind::SyncAppid);
    let err = sync.sync_by_appid(&job_id, 620).await.unwrap_err();
    assert!(err.contains("lookup failed"));

    let job = sync.tracker().get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(repo.game_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sync_top_aggregates_summary() {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    let source = Arc::new(
        StubSource::new()
            .with_game(620, "portal-2", "Portal 2")
            .with_history("portal-2", three_records("portal-2"))
            .with_game(1145360, "hades", "Hades")
            .with_history("hades", vec![record("hades", 1, 1, 12.5, 25.0)])
            .with_ranking(vec![620, 1145360, 42]),
    );
    let sync = service(Arc::clone(&repo), source);

    let job_id = sync.tracker().create_job(JobKind::SyncTop);
    let summary = sync.sync_top(&job_id, 10).await.unwrap();

    assert_eq!(summary.total_games, 2);
    assert_eq!(summary.total_inserted, 4);
    // appid 42 is unknown upstream and counts as an error.
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.synced, vec![620, 1145360]);

    let job = sync.tracker().get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}
