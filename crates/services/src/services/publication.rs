use std::sync::Arc;

use db::{
    DBService,
    models::{
        activity::{ActivityEntry, ActivityKind},
        event::Event,
        notification::OutboxNotification,
        proposal::{Decision, Proposal, PublicationStats},
    },
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    notifications::{NotificationRequest, NotificationSink, dispatch_all},
    principal::Principal,
    workflow_error::WorkflowError,
};

#[derive(Debug, Clone, Deserialize, TS)]
pub struct PublishRequest {
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PublishResult {
    pub published_count: i64,
    /// Proposals whose transaction failed; a later call picks them up again.
    pub failed: Vec<Uuid>,
}

/// Announces deliberation results to speakers.
#[derive(Clone)]
pub struct PublicationService {
    db: DBService,
    sink: Arc<dyn NotificationSink>,
    dispatch_enabled: bool,
}

impl PublicationService {
    pub fn new(db: DBService, sink: Arc<dyn NotificationSink>, dispatch_enabled: bool) -> Self {
        Self {
            db,
            sink,
            dispatch_enabled,
        }
    }

    /// Publish every eligible proposal of the event for `decision`.
    ///
    /// Each proposal flips in its own transaction whose `UPDATE` re-checks
    /// eligibility, so overlapping or repeated calls publish a proposal once.
    pub async fn publish(
        &self,
        event_id: Uuid,
        principal: &Principal,
        decision: Decision,
    ) -> Result<PublishResult, WorkflowError> {
        principal.require_organizer()?;
        Event::find_by_id(&self.db.pool, event_id)
            .await?
            .ok_or(WorkflowError::NotFound("Event"))?;

        let candidates = Proposal::find_publishable(&self.db.pool, event_id, decision).await?;
        debug!(event_id = %event_id, decision = %decision, candidates = candidates.len(), "Publishing");

        let mut published_count = 0;
        let mut failed = Vec::new();
        let mut requests = Vec::new();
        for proposal_id in candidates {
            match self.publish_one(proposal_id, decision).await {
                Ok(Some(queued)) => {
                    published_count += 1;
                    requests.extend(queued);
                }
                // Someone else published or re-decided it in between.
                Ok(None) => {}
                Err(e) => {
                    error!(proposal_id = %proposal_id, error = %e, "Failed to publish proposal");
                    failed.push(proposal_id);
                }
            }
        }

        info!(
            event_id = %event_id,
            decision = %decision,
            published_count,
            notifications = requests.len(),
            failed = failed.len(),
            "Published results"
        );

        if self.dispatch_enabled {
            dispatch_all(self.sink.as_ref(), requests).await;
        }

        Ok(PublishResult {
            published_count,
            failed,
        })
    }

    async fn publish_one(
        &self,
        proposal_id: Uuid,
        decision: Decision,
    ) -> Result<Option<Vec<NotificationRequest>>, WorkflowError> {
        let mut tx = self.db.begin_write().await?;

        let Some(proposal) = Proposal::mark_published(&mut *tx, proposal_id, decision).await?
        else {
            return Ok(None);
        };
        ActivityEntry::append(&mut *tx, proposal_id, &ActivityKind::ResultPublished { decision })
            .await?;

        let mut requests = Vec::with_capacity(proposal.speakers.len());
        for speaker_id in &proposal.speakers {
            let row = OutboxNotification::enqueue(&mut *tx, proposal_id, speaker_id, decision).await?;
            requests.push(NotificationRequest::from(&row));
        }

        tx.commit().await?;
        Ok(Some(requests))
    }

    pub async fn stats(
        &self,
        event_id: Uuid,
        principal: &Principal,
    ) -> Result<PublicationStats, WorkflowError> {
        principal.require_team_member()?;
        Event::find_by_id(&self.db.pool, event_id)
            .await?
            .ok_or(WorkflowError::NotFound("Event"))?;
        Ok(Proposal::publication_stats(&self.db.pool, event_id).await?)
    }
}
