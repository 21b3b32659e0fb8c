use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use db::models::proposal::PublicationStats;
use deployment::Deployment;
use services::services::publication::{PublishRequest, PublishResult};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::Caller};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/events/{event_id}/publish", post(publish))
        .route("/events/{event_id}/publication-stats", get(stats))
}

async fn publish(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<PublishRequest>,
) -> Result<Json<ApiResponse<PublishResult>>, ApiError> {
    let result = deployment
        .publication()
        .publish(event_id, &principal, payload.decision)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

async fn stats(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PublicationStats>>, ApiError> {
    let stats = deployment.publication().stats(event_id, &principal).await?;
    Ok(Json(ApiResponse::success(stats)))
}
