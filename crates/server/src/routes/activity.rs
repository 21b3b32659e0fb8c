use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use db::models::activity::ActivityEntry;
use deployment::Deployment;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use services::services::activity_feed::PostComment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::Caller};

const DEFAULT_TIMELINE_LIMIT: usize = 200;
const MAX_TIMELINE_LIMIT: usize = 1000;

/// Resume with `after_seq` set to the `seq` of the last entry received.
#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub after_seq: Option<i64>,
    pub limit: Option<usize>,
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/proposals/{proposal_id}/timeline", get(timeline))
        .route("/proposals/{proposal_id}/comments", post(post_comment))
        .route(
            "/proposals/{proposal_id}/comments/{entry_id}",
            delete(delete_comment),
        )
}

async fn timeline(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<ApiResponse<Vec<ActivityEntry>>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TIMELINE_LIMIT)
        .clamp(1, MAX_TIMELINE_LIMIT);
    let entries: Vec<ActivityEntry> = deployment
        .activity_feed()
        .timeline_for(proposal_id, &principal, query.after_seq.unwrap_or(0))
        .await?
        .take(limit)
        .try_collect()
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

async fn post_comment(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
    Json(payload): Json<PostComment>,
) -> Result<(StatusCode, Json<ApiResponse<ActivityEntry>>), ApiError> {
    let entry = deployment
        .activity_feed()
        .post_comment(proposal_id, &principal, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

async fn delete_comment(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path((proposal_id, entry_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<ActivityEntry>>, ApiError> {
    let marker = deployment
        .activity_feed()
        .delete_comment(proposal_id, &principal, entry_id)
        .await?;
    Ok(Json(ApiResponse::success(marker)))
}
