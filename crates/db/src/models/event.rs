//! Read-only view of a call-for-papers event.
//!
//! Events are owned by the event-management subsystem. The workflow only
//! needs identity, the owning team and the review switch, so that is all this
//! value object carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Event not found")]
    NotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Event {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub slug: String,
    pub review_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateEvent {
    pub team_id: Uuid,
    pub name: String,
    pub slug: String,
    pub review_enabled: Option<bool>,
}

impl Event {
    pub async fn create(pool: &SqlitePool, data: &CreateEvent) -> Result<Self, EventError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (id, team_id, name, slug, review_enabled)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.team_id)
        .bind(&data.name)
        .bind(&data.slug)
        .bind(data.review_enabled.unwrap_or(true))
        .fetch_one(pool)
        .await?;

        Ok(event)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, EventError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let event = sqlx::query_as::<_, Event>(r#"SELECT * FROM events WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(event)
    }

    /// Toggle whether reviewers may still submit opinions.
    pub async fn set_review_enabled(
        pool: &SqlitePool,
        id: Uuid,
        enabled: bool,
    ) -> Result<Self, EventError> {
        sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET review_enabled = ?2, updated_at = datetime('now', 'subsec')
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(enabled)
        .fetch_optional(pool)
        .await?
        .ok_or(EventError::NotFound)
    }
}
