use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use db::models::notification::OutboxNotification;
use deployment::Deployment;
use futures::Stream;
use serde::Deserialize;
use services::services::notifications::NotificationRequest;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::Caller};

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FailureReport {
    pub error: String,
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/proposals/{proposal_id}/notifications", get(delivery_status))
        .route("/notifications/pending", get(pending))
        .route("/notifications/stream", get(stream))
        .route("/notifications/{notification_id}/delivered", post(delivered))
        .route("/notifications/{notification_id}/failed", post(failed))
}

async fn delivery_status(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<OutboxNotification>>>, ApiError> {
    let notifications = deployment
        .notifications()
        .delivery_status(proposal_id, &principal)
        .await?;
    Ok(Json(ApiResponse::success(notifications)))
}

async fn pending(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Query(query): Query<PendingQuery>,
) -> Result<Json<ApiResponse<Vec<NotificationRequest>>>, ApiError> {
    principal.require_organizer()?;
    let requests = deployment
        .notifications()
        .pending(query.limit.unwrap_or(100))
        .await?;
    Ok(Json(ApiResponse::success(requests)))
}

async fn stream(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
) -> Result<Sse<impl Stream<Item = Result<Event, std::io::Error>>>, ApiError> {
    principal.require_organizer()?;
    let stream = deployment.stream_notifications().await?;
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}

async fn delivered(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OutboxNotification>>, ApiError> {
    let row = deployment
        .notifications()
        .report_delivered(notification_id, &principal)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}

async fn failed(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(notification_id): Path<Uuid>,
    Json(report): Json<FailureReport>,
) -> Result<Json<ApiResponse<OutboxNotification>>, ApiError> {
    let row = deployment
        .notifications()
        .report_failed(notification_id, &principal, &report.error)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}
