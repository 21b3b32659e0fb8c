use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, types::Json};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    proposal::{ConfirmationStatus, Decision, DeliberationStatus},
    review::Feeling,
};

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Activity entry not found")]
    NotFound,
}

/// What happened to a proposal. Stored as the JSON payload of the row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum ActivityKind {
    ReviewSubmitted {
        reviewer_id: String,
        note: Option<i64>,
        feeling: Feeling,
    },
    CommentPosted {
        author_id: String,
        text: String,
    },
    CommentDeleted {
        entry_id: Uuid,
    },
    StatusChanged {
        actor_id: String,
        from: DeliberationStatus,
        to: DeliberationStatus,
    },
    ResultPublished {
        decision: Decision,
    },
    ConfirmationChanged {
        speaker_id: String,
        status: ConfirmationStatus,
    },
}

impl ActivityKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ActivityKind::ReviewSubmitted { .. } => "review_submitted",
            ActivityKind::CommentPosted { .. } => "comment_posted",
            ActivityKind::CommentDeleted { .. } => "comment_deleted",
            ActivityKind::StatusChanged { .. } => "status_changed",
            ActivityKind::ResultPublished { .. } => "result_published",
            ActivityKind::ConfirmationChanged { .. } => "confirmation_changed",
        }
    }

    /// Principal responsible for the entry, if any.
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            ActivityKind::ReviewSubmitted { reviewer_id, .. } => Some(reviewer_id),
            ActivityKind::CommentPosted { author_id, .. } => Some(author_id),
            ActivityKind::StatusChanged { actor_id, .. } => Some(actor_id),
            ActivityKind::ConfirmationChanged { speaker_id, .. } => Some(speaker_id),
            ActivityKind::CommentDeleted { .. } | ActivityKind::ResultPublished { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub proposal_id: Uuid,
    /// Commit order within the whole table; strictly increasing.
    pub seq: i64,
    pub actor_id: Option<String>,
    pub kind: ActivityKind,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ActivityRow {
    seq: i64,
    id: Uuid,
    proposal_id: Uuid,
    actor_id: Option<String>,
    payload: Json<ActivityKind>,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityEntry {
    fn from(row: ActivityRow) -> Self {
        ActivityEntry {
            id: row.id,
            proposal_id: row.proposal_id,
            seq: row.seq,
            actor_id: row.actor_id,
            kind: row.payload.0,
            created_at: row.created_at,
        }
    }
}

impl ActivityEntry {
    /// Append an entry. Callers pass their open transaction so the entry
    /// commits together with the mutation it describes.
    pub async fn append<'e, E>(
        executor: E,
        proposal_id: Uuid,
        kind: &ActivityKind,
    ) -> Result<Self, ActivityError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ActivityRow>(
            r#"
            INSERT INTO proposal_activities (id, proposal_id, kind, actor_id, payload)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING seq, id, proposal_id, actor_id, payload, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(proposal_id)
        .bind(kind.tag())
        .bind(kind.actor_id())
        .bind(Json(kind))
        .fetch_one(executor)
        .await?;

        Ok(row.into())
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, ActivityError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT seq, id, proposal_id, actor_id, payload, created_at
            FROM proposal_activities
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Keyset page of a proposal's timeline: up to `limit` entries with
    /// `seq > after_seq`, ascending.
    pub async fn find_page(
        pool: &SqlitePool,
        proposal_id: Uuid,
        after_seq: i64,
        limit: i64,
    ) -> Result<Vec<Self>, ActivityError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT seq, id, proposal_id, actor_id, payload, created_at
            FROM proposal_activities
            WHERE proposal_id = ?1 AND seq > ?2
            ORDER BY seq ASC
            LIMIT ?3
            "#,
        )
        .bind(proposal_id)
        .bind(after_seq)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Whether a `CommentDeleted` entry already references `entry_id`.
    pub async fn is_comment_deleted<'e, E>(
        executor: E,
        proposal_id: Uuid,
        entry_id: Uuid,
    ) -> Result<bool, ActivityError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let deleted = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM proposal_activities
                WHERE proposal_id = ?1
                  AND kind = 'comment_deleted'
                  AND json_extract(payload, '$.entry_id') = ?2
            )
            "#,
        )
        .bind(proposal_id)
        .bind(entry_id.to_string())
        .fetch_one(executor)
        .await?;

        Ok(deleted)
    }
}
