use db::{
    DBService,
    models::{
        activity::{ActivityEntry, ActivityKind},
        event::Event,
        proposal::{DeliberationStatus, Proposal, ProposalFilter, PublicationStatus},
        review::{Feeling, MAX_NOTE, MIN_NOTE, Review, UpsertReview},
    },
};
use serde::Deserialize;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use super::{aggregation::ReviewAggregate, principal::Principal, workflow_error::WorkflowError};

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SubmitReview {
    pub note: Option<i64>,
    pub feeling: Feeling,
}

/// Listing filters offered to the review team.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ProposalQuery {
    pub deliberation_status: Option<DeliberationStatus>,
    pub publication_status: Option<PublicationStatus>,
    #[serde(default)]
    pub not_reviewed_by_me: bool,
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Clone)]
pub struct ReviewService {
    db: DBService,
}

impl ReviewService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// Create or overwrite the caller's review of a proposal.
    pub async fn submit_review(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
        data: &SubmitReview,
    ) -> Result<Review, WorkflowError> {
        principal.require_team_member()?;
        if let Some(note) = data.note
            && !(MIN_NOTE..=MAX_NOTE).contains(&note)
        {
            return Err(WorkflowError::InvalidInput(format!(
                "note must be between {MIN_NOTE} and {MAX_NOTE}, got {note}"
            )));
        }

        let mut tx = self.db.begin_write().await?;

        let proposal = Proposal::find_by_id(&mut *tx, proposal_id)
            .await?
            .ok_or(WorkflowError::NotFound("Proposal"))?;
        if proposal.is_archived() {
            return Err(WorkflowError::InvalidState(
                "archived proposals can no longer be reviewed".into(),
            ));
        }
        let event = Event::find_by_id(&mut *tx, proposal.event_id)
            .await?
            .ok_or(WorkflowError::NotFound("Event"))?;
        if !event.review_enabled {
            return Err(WorkflowError::InvalidState(format!(
                "reviews are closed for {}",
                event.name
            )));
        }

        let review = Review::upsert(
            &mut *tx,
            &UpsertReview {
                proposal_id,
                reviewer_id: principal.id.clone(),
                note: data.note,
                feeling: data.feeling,
            },
        )
        .await?;
        ActivityEntry::append(
            &mut *tx,
            proposal_id,
            &ActivityKind::ReviewSubmitted {
                reviewer_id: principal.id.clone(),
                note: review.note,
                feeling: review.feeling,
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            proposal_id = %proposal_id,
            reviewer_id = %principal.id,
            note = ?review.note,
            feeling = %review.feeling,
            "Review submitted"
        );
        Ok(review)
    }

    pub async fn get_aggregate(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
    ) -> Result<ReviewAggregate, WorkflowError> {
        principal.require_team_member()?;
        self.ensure_proposal(proposal_id).await?;
        let reviews = Review::find_by_proposal(&self.db.pool, proposal_id).await?;
        debug!(proposal_id = %proposal_id, reviews = reviews.len(), "Aggregating reviews");
        Ok(ReviewAggregate::from_reviews(&reviews))
    }

    pub async fn my_review(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
    ) -> Result<Option<Review>, WorkflowError> {
        principal.require_team_member()?;
        self.ensure_proposal(proposal_id).await?;
        Ok(Review::find_by_reviewer(&self.db.pool, proposal_id, &principal.id).await?)
    }

    pub async fn list_reviews(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
    ) -> Result<Vec<Review>, WorkflowError> {
        principal.require_team_member()?;
        self.ensure_proposal(proposal_id).await?;
        Ok(Review::find_by_proposal(&self.db.pool, proposal_id).await?)
    }

    pub async fn list_proposals(
        &self,
        event_id: Uuid,
        principal: &Principal,
        query: &ProposalQuery,
    ) -> Result<Vec<Proposal>, WorkflowError> {
        principal.require_team_member()?;
        Event::find_by_id(&self.db.pool, event_id)
            .await?
            .ok_or(WorkflowError::NotFound("Event"))?;

        let filter = ProposalFilter {
            deliberation_status: query.deliberation_status,
            publication_status: query.publication_status,
            not_reviewed_by: query.not_reviewed_by_me.then(|| principal.id.clone()),
            include_archived: query.include_archived,
        };
        let proposals = Proposal::find_by_event(&self.db.pool, event_id, &filter).await?;
        debug!(event_id = %event_id, count = proposals.len(), "Listed proposals");
        Ok(proposals)
    }

    async fn ensure_proposal(&self, proposal_id: Uuid) -> Result<Proposal, WorkflowError> {
        Proposal::find_by_id(&self.db.pool, proposal_id)
            .await?
            .ok_or(WorkflowError::NotFound("Proposal"))
    }
}
