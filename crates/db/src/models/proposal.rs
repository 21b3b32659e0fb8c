use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type, types::Json};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProposalError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Proposal not found")]
    NotFound,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[sqlx(type_name = "deliberation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DeliberationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl std::fmt::Display for DeliberationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliberationStatus::Pending => write!(f, "pending"),
            DeliberationStatus::Accepted => write!(f, "accepted"),
            DeliberationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[sqlx(type_name = "publication_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PublicationStatus {
    NotPublished,
    Published,
}

impl std::fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublicationStatus::NotPublished => write!(f, "not_published"),
            PublicationStatus::Published => write!(f, "published"),
        }
    }
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[sqlx(type_name = "confirmation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Declined,
}

impl std::fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmationStatus::Pending => write!(f, "pending"),
            ConfirmationStatus::Confirmed => write!(f, "confirmed"),
            ConfirmationStatus::Declined => write!(f, "declined"),
        }
    }
}

/// A deliberation outcome that can be communicated to speakers.
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[sqlx(type_name = "decision", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Decision {
    Accepted,
    Rejected,
}

impl From<Decision> for DeliberationStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => DeliberationStatus::Accepted,
            Decision::Rejected => DeliberationStatus::Rejected,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", DeliberationStatus::from(*self))
    }
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS)]
#[sqlx(type_name = "proposal_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProposalLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// The three fields owned by the review workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct WorkflowState {
    pub deliberation_status: DeliberationStatus,
    pub publication_status: PublicationStatus,
    pub confirmation_status: ConfirmationStatus,
}

impl WorkflowState {
    pub fn initial() -> Self {
        Self {
            deliberation_status: DeliberationStatus::Pending,
            publication_status: PublicationStatus::NotPublished,
            confirmation_status: ConfirmationStatus::Pending,
        }
    }

    pub fn is_published(&self) -> bool {
        self.publication_status == PublicationStatus::Published
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Proposal {
    pub id: Uuid,
    pub event_id: Uuid,
    pub talk_id: Option<Uuid>,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub level: Option<ProposalLevel>,
    pub languages: Vec<String>,
    pub references: Option<String>,
    /// Ordered, duplicate free.
    pub speakers: Vec<String>,
    pub formats: Vec<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub deliberation_status: DeliberationStatus,
    pub publication_status: PublicationStatus,
    pub confirmation_status: ConfirmationStatus,
    pub archived_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ProposalRow {
    id: Uuid,
    event_id: Uuid,
    talk_id: Option<Uuid>,
    title: String,
    abstract_text: String,
    level: Option<ProposalLevel>,
    languages: Json<Vec<String>>,
    references: Option<String>,
    speakers: Json<Vec<String>>,
    formats: Json<Vec<String>>,
    categories: Json<Vec<String>>,
    tags: Json<Vec<String>>,
    deliberation_status: DeliberationStatus,
    publication_status: PublicationStatus,
    confirmation_status: ConfirmationStatus,
    archived_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProposalRow> for Proposal {
    fn from(row: ProposalRow) -> Self {
        Proposal {
            id: row.id,
            event_id: row.event_id,
            talk_id: row.talk_id,
            title: row.title,
            abstract_text: row.abstract_text,
            level: row.level,
            languages: row.languages.0,
            references: row.references,
            speakers: row.speakers.0,
            formats: row.formats.0,
            categories: row.categories.0,
            tags: row.tags.0,
            deliberation_status: row.deliberation_status,
            publication_status: row.publication_status,
            confirmation_status: row.confirmation_status,
            archived_at: row.archived_at,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProposal {
    pub event_id: Uuid,
    pub talk_id: Option<Uuid>,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    pub level: Option<ProposalLevel>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub references: Option<String>,
    pub speakers: Vec<String>,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Listing filter used by the reviewer and organizer proposal lists.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ProposalFilter {
    pub deliberation_status: Option<DeliberationStatus>,
    pub publication_status: Option<PublicationStatus>,
    /// Only proposals this reviewer has not reviewed yet.
    pub not_reviewed_by: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

/// Publication dashboard counters, taken from one statement.
#[derive(Debug, Clone, Copy, FromRow, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export)]
pub struct PublicationStats {
    pub accepted_to_publish: i64,
    pub rejected_to_publish: i64,
    pub total_published: i64,
    pub total_proposals: i64,
}

/// Keeps the first occurrence of every id.
fn dedup_ordered(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

impl Proposal {
    pub fn workflow_state(&self) -> WorkflowState {
        WorkflowState {
            deliberation_status: self.deliberation_status,
            publication_status: self.publication_status,
            confirmation_status: self.confirmation_status,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn has_speaker(&self, speaker_id: &str) -> bool {
        self.speakers.iter().any(|s| s == speaker_id)
    }

    /// Insert a submitted proposal. Owned by the submission subsystem; the
    /// workflow fields always start at their initial values.
    pub async fn create(pool: &SqlitePool, data: &CreateProposal) -> Result<Self, ProposalError> {
        let row = sqlx::query_as::<_, ProposalRow>(
            r#"
            INSERT INTO proposals (
                id, event_id, talk_id, title, abstract_text, level, languages,
                "references", speakers, formats, categories, tags
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.event_id)
        .bind(data.talk_id)
        .bind(&data.title)
        .bind(&data.abstract_text)
        .bind(data.level)
        .bind(Json(&data.languages))
        .bind(&data.references)
        .bind(Json(dedup_ordered(&data.speakers)))
        .bind(Json(&data.formats))
        .bind(Json(&data.categories))
        .bind(Json(&data.tags))
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, ProposalError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ProposalRow>(r#"SELECT * FROM proposals WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(row.map(Into::into))
    }

    pub async fn find_by_event(
        pool: &SqlitePool,
        event_id: Uuid,
        filter: &ProposalFilter,
    ) -> Result<Vec<Self>, ProposalError> {
        let rows = sqlx::query_as::<_, ProposalRow>(
            r#"
            SELECT * FROM proposals p
            WHERE p.event_id = ?1
              AND (?2 IS NULL OR p.deliberation_status = ?2)
              AND (?3 IS NULL OR p.publication_status = ?3)
              AND (?4 IS NULL OR NOT EXISTS (
                    SELECT 1 FROM reviews r
                    WHERE r.proposal_id = p.id AND r.reviewer_id = ?4
                  ))
              AND (?5 OR p.archived_at IS NULL)
            ORDER BY p.created_at ASC
            "#,
        )
        .bind(event_id)
        .bind(filter.deliberation_status)
        .bind(filter.publication_status)
        .bind(&filter.not_reviewed_by)
        .bind(filter.include_archived)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Ids of the proposals a `publish` call for `decision` would pick up.
    pub async fn find_publishable(
        pool: &SqlitePool,
        event_id: Uuid,
        decision: Decision,
    ) -> Result<Vec<Uuid>, ProposalError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM proposals
            WHERE event_id = ?1
              AND deliberation_status = ?2
              AND publication_status = 'not_published'
              AND archived_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(event_id)
        .bind(DeliberationStatus::from(decision))
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    /// Compare-and-set write of the workflow fields.
    ///
    /// Returns `None` when the stored version no longer equals
    /// `expected_version`, meaning another writer committed first.
    pub async fn update_workflow<'e, E>(
        executor: E,
        id: Uuid,
        expected_version: i64,
        state: WorkflowState,
    ) -> Result<Option<Self>, ProposalError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ProposalRow>(
            r#"
            UPDATE proposals
            SET deliberation_status = ?3,
                publication_status = ?4,
                confirmation_status = ?5,
                version = version + 1,
                updated_at = datetime('now', 'subsec')
            WHERE id = ?1 AND version = ?2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(state.deliberation_status)
        .bind(state.publication_status)
        .bind(state.confirmation_status)
        .fetch_optional(executor)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Flip an eligible proposal to published.
    ///
    /// The eligibility predicate is part of the `UPDATE`, so of two
    /// concurrent callers exactly one gets the row back.
    pub async fn mark_published<'e, E>(
        executor: E,
        id: Uuid,
        decision: Decision,
    ) -> Result<Option<Self>, ProposalError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ProposalRow>(
            r#"
            UPDATE proposals
            SET publication_status = 'published',
                confirmation_status = 'pending',
                version = version + 1,
                updated_at = datetime('now', 'subsec')
            WHERE id = ?1
              AND deliberation_status = ?2
              AND publication_status = 'not_published'
              AND archived_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(DeliberationStatus::from(decision))
        .fetch_optional(executor)
        .await?;

        Ok(row.map(Into::into))
    }

    pub async fn publication_stats(
        pool: &SqlitePool,
        event_id: Uuid,
    ) -> Result<PublicationStats, ProposalError> {
        let stats = sqlx::query_as::<_, PublicationStats>(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN deliberation_status = 'accepted'
                                   AND publication_status = 'not_published' THEN 1 ELSE 0 END), 0)
                    AS accepted_to_publish,
                COALESCE(SUM(CASE WHEN deliberation_status = 'rejected'
                                   AND publication_status = 'not_published' THEN 1 ELSE 0 END), 0)
                    AS rejected_to_publish,
                COALESCE(SUM(CASE WHEN publication_status = 'published' THEN 1 ELSE 0 END), 0)
                    AS total_published,
                COUNT(*) AS total_proposals
            FROM proposals
            WHERE event_id = ?1 AND archived_at IS NULL
            "#,
        )
        .bind(event_id)
        .fetch_one(pool)
        .await?;

        Ok(stats)
    }

    /// Soft-archive a proposal. Set by the submission subsystem.
    pub async fn archive(pool: &SqlitePool, id: Uuid) -> Result<Self, ProposalError> {
        sqlx::query_as::<_, ProposalRow>(
            r#"
            UPDATE proposals
            SET archived_at = COALESCE(archived_at, datetime('now', 'subsec')),
                version = version + 1,
                updated_at = datetime('now', 'subsec')
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Into::into)
        .ok_or(ProposalError::NotFound)
    }

    pub async fn unarchive(pool: &SqlitePool, id: Uuid) -> Result<Self, ProposalError> {
        sqlx::query_as::<_, ProposalRow>(
            r#"
            UPDATE proposals
            SET archived_at = NULL,
                version = version + 1,
                updated_at = datetime('now', 'subsec')
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Into::into)
        .ok_or(ProposalError::NotFound)
    }
}
