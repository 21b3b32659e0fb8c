//! Outbox of speaker notifications.
//!
//! Rows are written in the same transaction that publishes a proposal, so a
//! decision epoch yields exactly one row per speaker. Delivery is owned by an
//! external worker which reports back through `mark_delivered` and
//! `mark_failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::proposal::Decision;

#[derive(Debug, Error)]
pub enum NotificationOutboxError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Notification not found")]
    NotFound,
    #[error("Notification was already delivered")]
    AlreadyDelivered,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS)]
#[sqlx(type_name = "template_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TemplateKind {
    ProposalAccepted,
    ProposalRejected,
}

impl From<Decision> for TemplateKind {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => TemplateKind::ProposalAccepted,
            Decision::Rejected => TemplateKind::ProposalRejected,
        }
    }
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS)]
#[sqlx(type_name = "delivery_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct OutboxNotification {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub speaker_id: String,
    pub template_kind: TemplateKind,
    pub decision: Decision,
    pub status: DeliveryStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxNotification {
    pub async fn enqueue<'e, E>(
        executor: E,
        proposal_id: Uuid,
        speaker_id: &str,
        decision: Decision,
    ) -> Result<Self, NotificationOutboxError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let notification = sqlx::query_as::<_, OutboxNotification>(
            r#"
            INSERT INTO notification_outbox (id, proposal_id, speaker_id, template_kind, decision)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(proposal_id)
        .bind(speaker_id)
        .bind(TemplateKind::from(decision))
        .bind(decision)
        .fetch_one(executor)
        .await?;

        Ok(notification)
    }

    pub async fn find_by_proposal(
        pool: &SqlitePool,
        proposal_id: Uuid,
    ) -> Result<Vec<Self>, NotificationOutboxError> {
        let notifications = sqlx::query_as::<_, OutboxNotification>(
            r#"
            SELECT * FROM notification_outbox
            WHERE proposal_id = ?1
            ORDER BY created_at ASC
            "#,
        )
        .bind(proposal_id)
        .fetch_all(pool)
        .await?;

        Ok(notifications)
    }

    /// Notifications still waiting for the delivery worker, oldest first.
    pub async fn find_pending(
        pool: &SqlitePool,
        limit: i64,
    ) -> Result<Vec<Self>, NotificationOutboxError> {
        let notifications = sqlx::query_as::<_, OutboxNotification>(
            r#"
            SELECT * FROM notification_outbox
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(notifications)
    }

    pub async fn mark_delivered(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Self, NotificationOutboxError> {
        sqlx::query_as::<_, OutboxNotification>(
            r#"
            UPDATE notification_outbox
            SET status = 'delivered',
                attempts = attempts + 1,
                last_error = NULL,
                updated_at = datetime('now', 'subsec')
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(NotificationOutboxError::NotFound)
    }

    /// Record a failed attempt. The row goes back to `pending` for another
    /// try until `max_attempts` is reached, then stays `failed`.
    pub async fn mark_failed(
        pool: &SqlitePool,
        id: Uuid,
        error: &str,
        max_attempts: i64,
    ) -> Result<Self, NotificationOutboxError> {
        let updated = sqlx::query_as::<_, OutboxNotification>(
            r#"
            UPDATE notification_outbox
            SET attempts = attempts + 1,
                status = CASE WHEN attempts + 1 >= ?3 THEN 'failed' ELSE 'pending' END,
                last_error = ?2,
                updated_at = datetime('now', 'subsec')
            WHERE id = ?1 AND status != 'delivered'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(row) => Ok(row),
            None if Self::find_by_id(pool, id).await?.is_some() => {
                Err(NotificationOutboxError::AlreadyDelivered)
            }
            None => Err(NotificationOutboxError::NotFound),
        }
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, OutboxNotification>("SELECT * FROM notification_outbox WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
