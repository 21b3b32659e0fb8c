use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use db::models::proposal::Proposal;
use deployment::Deployment;
use services::services::deliberation::{BulkStatusOutcome, SetStatus, SetStatusBulk};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::Caller};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/proposals/{proposal_id}/status", post(set_status))
        .route("/events/{event_id}/proposals/status", post(set_status_bulk))
}

async fn set_status(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
    Json(payload): Json<SetStatus>,
) -> Result<Json<ApiResponse<Proposal>>, ApiError> {
    let proposal = deployment
        .deliberation()
        .set_status(proposal_id, &principal, &payload)
        .await?;
    Ok(Json(ApiResponse::success(proposal)))
}

async fn set_status_bulk(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<SetStatusBulk>,
) -> Result<Json<ApiResponse<BulkStatusOutcome>>, ApiError> {
    let outcome = deployment
        .deliberation()
        .set_status_bulk(event_id, &principal, &payload)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
