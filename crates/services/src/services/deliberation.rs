//! Organizer decisions on proposals.
//!
//! A decision change on a published proposal starts a new decision epoch:
//! publication and confirmation are reset in the same write, and only when
//! the caller explicitly confirmed the re-decision.

use std::collections::{BTreeMap, BTreeSet};

use db::{
    DBService,
    models::{
        activity::{ActivityEntry, ActivityKind},
        proposal::{
            ConfirmationStatus, DeliberationStatus, Proposal, PublicationStatus, WorkflowState,
        },
    },
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    principal::Principal,
    workflow_error::{ErrorKind, WorkflowError},
};

/// Outcome of planning a transition against the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Already in the requested status; nothing is written.
    Unchanged,
    Apply {
        next: WorkflowState,
        /// The proposal was published and this write reopens it.
        reopens_publication: bool,
    },
}

/// Decide what a move to `to` does, without touching storage.
pub fn plan_transition(
    current: WorkflowState,
    archived: bool,
    to: DeliberationStatus,
    confirm_republication: bool,
) -> Result<Transition, WorkflowError> {
    if archived {
        return Err(WorkflowError::InvalidState(
            "archived proposals cannot be deliberated".into(),
        ));
    }
    if current.deliberation_status == to {
        return Ok(Transition::Unchanged);
    }
    let reopens_publication = current.is_published();
    if reopens_publication && !confirm_republication {
        return Err(WorkflowError::RequiresConfirmation);
    }

    Ok(Transition::Apply {
        next: WorkflowState {
            deliberation_status: to,
            publication_status: PublicationStatus::NotPublished,
            confirmation_status: ConfirmationStatus::Pending,
        },
        reopens_publication,
    })
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SetStatus {
    pub status: DeliberationStatus,
    #[serde(default)]
    pub confirm_republication: bool,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SetStatusBulk {
    pub proposal_ids: Vec<Uuid>,
    pub status: DeliberationStatus,
    #[serde(default)]
    pub confirm_republication: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BulkStatusOutcome {
    pub updated: BTreeSet<Uuid>,
    pub skipped: BTreeMap<Uuid, ErrorKind>,
}

#[derive(Clone)]
pub struct DeliberationService {
    db: DBService,
    max_bulk: usize,
}

impl DeliberationService {
    pub fn new(db: DBService, max_bulk: usize) -> Self {
        Self { db, max_bulk }
    }

    pub async fn set_status(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
        request: &SetStatus,
    ) -> Result<Proposal, WorkflowError> {
        principal.require_organizer()?;
        self.apply(proposal_id, None, principal, request.status, request.confirm_republication)
            .await
    }

    /// Best-effort bulk move. Each id runs in its own transaction and is
    /// reported either as updated or with the reason it was skipped.
    pub async fn set_status_bulk(
        &self,
        event_id: Uuid,
        principal: &Principal,
        request: &SetStatusBulk,
    ) -> Result<BulkStatusOutcome, WorkflowError> {
        principal.require_organizer()?;
        let unique: BTreeSet<Uuid> = request.proposal_ids.iter().copied().collect();
        if unique.len() > self.max_bulk {
            return Err(WorkflowError::InvalidInput(format!(
                "at most {} proposals per bulk update, got {}",
                self.max_bulk,
                unique.len()
            )));
        }

        let mut outcome = BulkStatusOutcome::default();
        for proposal_id in unique {
            match self
                .apply(
                    proposal_id,
                    Some(event_id),
                    principal,
                    request.status,
                    request.confirm_republication,
                )
                .await
            {
                Ok(_) => {
                    outcome.updated.insert(proposal_id);
                }
                Err(e) => {
                    if let WorkflowError::Database(db_err) = &e {
                        error!(proposal_id = %proposal_id, error = %db_err, "Bulk status store error");
                    } else {
                        warn!(proposal_id = %proposal_id, reason = %e, "Skipped in bulk status update");
                    }
                    outcome.skipped.insert(proposal_id, e.kind());
                }
            }
        }

        info!(
            event_id = %event_id,
            status = %request.status,
            updated = outcome.updated.len(),
            skipped = outcome.skipped.len(),
            "Bulk status update finished"
        );
        Ok(outcome)
    }

    async fn apply(
        &self,
        proposal_id: Uuid,
        scope_event: Option<Uuid>,
        principal: &Principal,
        to: DeliberationStatus,
        confirm_republication: bool,
    ) -> Result<Proposal, WorkflowError> {
        let mut tx = self.db.begin_write().await?;

        let proposal = Proposal::find_by_id(&mut *tx, proposal_id)
            .await?
            .filter(|p| scope_event.is_none_or(|event_id| p.event_id == event_id))
            .ok_or(WorkflowError::NotFound("Proposal"))?;

        let (next, reopens_publication) = match plan_transition(
            proposal.workflow_state(),
            proposal.is_archived(),
            to,
            confirm_republication,
        )? {
            Transition::Unchanged => return Ok(proposal),
            Transition::Apply {
                next,
                reopens_publication,
            } => (next, reopens_publication),
        };

        let updated = Proposal::update_workflow(&mut *tx, proposal_id, proposal.version, next)
            .await?
            .ok_or_else(|| WorkflowError::lost_update(proposal_id))?;
        ActivityEntry::append(
            &mut *tx,
            proposal_id,
            &ActivityKind::StatusChanged {
                actor_id: principal.id.clone(),
                from: proposal.deliberation_status,
                to,
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            proposal_id = %proposal_id,
            actor_id = %principal.id,
            from = %proposal.deliberation_status,
            to = %to,
            reopens_publication,
            "Deliberation status changed"
        );
        Ok(updated)
    }
}
