use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use db::models::proposal::Proposal;
use deployment::Deployment;
use services::services::{principal::Role, reviews::ProposalQuery, workflow_error::WorkflowError};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::Caller};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/events/{event_id}/proposals", get(list_proposals))
        .route("/proposals/{proposal_id}", get(get_proposal))
}

async fn list_proposals(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(event_id): Path<Uuid>,
    Query(query): Query<ProposalQuery>,
) -> Result<Json<ApiResponse<Vec<Proposal>>>, ApiError> {
    let proposals = deployment
        .reviews()
        .list_proposals(event_id, &principal, &query)
        .await?;
    Ok(Json(ApiResponse::success(proposals)))
}

async fn get_proposal(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Proposal>>, ApiError> {
    let proposal = Proposal::find_by_id(&deployment.db().pool, proposal_id)
        .await
        .map_err(WorkflowError::from)?
        // Speakers only see their own proposals.
        .filter(|p| principal.role != Role::Speaker || p.has_speaker(&principal.id))
        .ok_or(WorkflowError::NotFound("Proposal"))?;

    Ok(Json(ApiResponse::success(proposal)))
}
