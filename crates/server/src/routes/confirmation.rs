use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use db::models::proposal::Proposal;
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::Caller};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/proposals/{proposal_id}/confirm", post(confirm))
        .route("/proposals/{proposal_id}/decline", post(decline))
}

async fn confirm(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Proposal>>, ApiError> {
    let proposal = deployment
        .confirmation()
        .confirm(proposal_id, &principal)
        .await?;
    Ok(Json(ApiResponse::success(proposal)))
}

async fn decline(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Proposal>>, ApiError> {
    let proposal = deployment
        .confirmation()
        .decline(proposal_id, &principal)
        .await?;
    Ok(Json(ApiResponse::success(proposal)))
}
