use db::{
    DBService,
    models::{
        activity::{ActivityEntry, ActivityKind},
        proposal::{ConfirmationStatus, DeliberationStatus, Proposal, WorkflowState},
    },
};
use tracing::info;
use uuid::Uuid;

use super::{principal::Principal, workflow_error::WorkflowError};

/// Whether a speaker may still answer, given the current state.
pub fn check_answerable(state: &WorkflowState) -> Result<(), WorkflowError> {
    if state.deliberation_status != DeliberationStatus::Accepted {
        return Err(WorkflowError::InvalidState(format!(
            "only accepted proposals can be confirmed, this one is {}",
            state.deliberation_status
        )));
    }
    if !state.is_published() {
        return Err(WorkflowError::InvalidState(
            "the decision has not been published yet".into(),
        ));
    }
    if state.confirmation_status != ConfirmationStatus::Pending {
        return Err(WorkflowError::InvalidState(format!(
            "participation was already {}",
            state.confirmation_status
        )));
    }
    Ok(())
}

/// Speaker answers to an accepted, published proposal.
#[derive(Clone)]
pub struct ConfirmationService {
    db: DBService,
}

impl ConfirmationService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn confirm(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
    ) -> Result<Proposal, WorkflowError> {
        self.answer(proposal_id, principal, ConfirmationStatus::Confirmed)
            .await
    }

    pub async fn decline(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
    ) -> Result<Proposal, WorkflowError> {
        self.answer(proposal_id, principal, ConfirmationStatus::Declined)
            .await
    }

    async fn answer(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
        status: ConfirmationStatus,
    ) -> Result<Proposal, WorkflowError> {
        let mut tx = self.db.begin_write().await?;

        let proposal = Proposal::find_by_id(&mut *tx, proposal_id)
            .await?
            .ok_or(WorkflowError::NotFound("Proposal"))?;
        // Co-speakers share one answer; whoever answers first decides.
        if !proposal.has_speaker(&principal.id) {
            return Err(WorkflowError::Forbidden(format!(
                "'{}' is not a speaker of this proposal",
                principal.id
            )));
        }
        let state = proposal.workflow_state();
        check_answerable(&state)?;

        let next = WorkflowState {
            confirmation_status: status,
            ..state
        };
        let updated = Proposal::update_workflow(&mut *tx, proposal_id, proposal.version, next)
            .await?
            .ok_or_else(|| WorkflowError::lost_update(proposal_id))?;
        ActivityEntry::append(
            &mut *tx,
            proposal_id,
            &ActivityKind::ConfirmationChanged {
                speaker_id: principal.id.clone(),
                status,
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            proposal_id = %proposal_id,
            speaker_id = %principal.id,
            status = %status,
            "Speaker answered"
        );
        Ok(updated)
    }
}
