use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use uuid::Uuid;

use super::{
    event::{CreateEvent, Event},
    proposal::{CreateProposal, Proposal},
};
use crate::DBService;

/// Fresh, fully migrated in-memory database. Every call gets its own
/// database, so tests never observe each other's rows.
pub async fn setup_test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("invalid sqlite config")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("failed to open sqlite memory db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to apply migrations");

    pool
}

/// File-backed WAL database opened through [`DBService::new_with_url`], so
/// several pooled connections write concurrently. The directory is removed
/// when the value is dropped.
pub struct FileTestDb {
    pub db: DBService,
    _dir: tempfile::TempDir,
}

pub async fn setup_file_test_db() -> FileTestDb {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("workflow.sqlite").display());
    let db = DBService::new_with_url(&url)
        .await
        .expect("failed to open file-backed db");
    FileTestDb { db, _dir: dir }
}

pub async fn create_test_event(pool: &SqlitePool) -> Event {
    let id = Uuid::new_v4();
    Event::create(
        pool,
        &CreateEvent {
            team_id: Uuid::new_v4(),
            name: format!("Test Conf {}", id),
            slug: format!("test-conf-{}", id),
            review_enabled: None,
        },
    )
    .await
    .expect("failed to create test event")
}

pub async fn create_test_proposal(pool: &SqlitePool, event_id: Uuid, speakers: &[&str]) -> Proposal {
    Proposal::create(
        pool,
        &CreateProposal {
            event_id,
            talk_id: Some(Uuid::new_v4()),
            title: "Fearless concurrency in practice".into(),
            abstract_text: "Lessons from a year of async Rust".into(),
            level: None,
            languages: vec!["en".into()],
            references: None,
            speakers: speakers.iter().map(|s| s.to_string()).collect(),
            formats: vec![],
            categories: vec![],
            tags: vec![],
        },
    )
    .await
    .expect("failed to create test proposal")
}
