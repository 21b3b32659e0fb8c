use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Review not found")]
    NotFound,
}

/// Lowest and highest accepted `note`.
pub const MIN_NOTE: i64 = 0;
pub const MAX_NOTE: i64 = 5;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, TS,
)]
#[sqlx(type_name = "feeling", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Feeling {
    Negative,
    Neutral,
    Positive,
    NoOpinion,
}

impl std::fmt::Display for Feeling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feeling::Negative => write!(f, "negative"),
            Feeling::Neutral => write!(f, "neutral"),
            Feeling::Positive => write!(f, "positive"),
            Feeling::NoOpinion => write!(f, "no_opinion"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Review {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub reviewer_id: String,
    /// `None` until the reviewer scores the proposal.
    pub note: Option<i64>,
    pub feeling: Feeling,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpsertReview {
    pub proposal_id: Uuid,
    pub reviewer_id: String,
    pub note: Option<i64>,
    pub feeling: Feeling,
}

impl Review {
    /// Insert or overwrite the opinion of `reviewer_id` on `proposal_id`.
    pub async fn upsert<'e, E>(executor: E, data: &UpsertReview) -> Result<Self, ReviewError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, proposal_id, reviewer_id, note, feeling)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (proposal_id, reviewer_id) DO UPDATE SET
                note = excluded.note,
                feeling = excluded.feeling,
                updated_at = datetime('now', 'subsec')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.proposal_id)
        .bind(&data.reviewer_id)
        .bind(data.note)
        .bind(data.feeling)
        .fetch_one(executor)
        .await?;

        Ok(review)
    }

    pub async fn find_by_proposal(
        pool: &SqlitePool,
        proposal_id: Uuid,
    ) -> Result<Vec<Self>, ReviewError> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE proposal_id = ?1
            ORDER BY created_at ASC
            "#,
        )
        .bind(proposal_id)
        .fetch_all(pool)
        .await?;

        Ok(reviews)
    }

    pub async fn find_by_reviewer(
        pool: &SqlitePool,
        proposal_id: Uuid,
        reviewer_id: &str,
    ) -> Result<Option<Self>, ReviewError> {
        let review = sqlx::query_as::<_, Review>(
            r#"SELECT * FROM reviews WHERE proposal_id = ?1 AND reviewer_id = ?2"#,
        )
        .bind(proposal_id)
        .bind(reviewer_id)
        .fetch_optional(pool)
        .await?;

        Ok(review)
    }

    /// Drop a reviewer's opinion, used when they leave the team.
    pub async fn delete(
        pool: &SqlitePool,
        proposal_id: Uuid,
        reviewer_id: &str,
    ) -> Result<(), ReviewError> {
        let result = sqlx::query(r#"DELETE FROM reviews WHERE proposal_id = ?1 AND reviewer_id = ?2"#)
            .bind(proposal_id)
            .bind(reviewer_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ReviewError::NotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_utils::{create_test_event, create_test_proposal, setup_test_pool};

    #[tokio::test]
    async fn upsert_keeps_one_row_per_reviewer() {
        let pool = setup_test_pool().await;
        let event = create_test_event(&pool).await;
        let proposal = create_test_proposal(&pool, event.id, &["ada"]).await;

        let first = Review::upsert(
            &pool,
            &UpsertReview {
                proposal_id: proposal.id,
                reviewer_id: "rev-1".into(),
                note: Some(1),
                feeling: Feeling::Negative,
            },
        )
        .await
        .unwrap();

        let second = Review::upsert(
            &pool,
            &UpsertReview {
                proposal_id: proposal.id,
                reviewer_id: "rev-1".into(),
                note: None,
                feeling: Feeling::NoOpinion,
            },
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.note, None);
        assert_eq!(second.feeling, Feeling::NoOpinion);

        let all = Review::find_by_proposal(&pool, proposal.id).await.unwrap();
        assert_eq!(all.len(), 1);

        Review::delete(&pool, proposal.id, "rev-1").await.unwrap();
        assert!(
            Review::find_by_reviewer(&pool, proposal.id, "rev-1")
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            Review::delete(&pool, proposal.id, "rev-1").await,
            Err(ReviewError::NotFound)
        ));
    }
}
