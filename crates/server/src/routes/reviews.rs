use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use db::models::review::Review;
use deployment::Deployment;
use services::services::{aggregation::ReviewAggregate, reviews::SubmitReview};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::Caller};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/proposals/{proposal_id}/reviews",
            get(list_reviews).post(submit_review),
        )
        .route("/proposals/{proposal_id}/reviews/me", get(my_review))
        .route("/proposals/{proposal_id}/aggregate", get(get_aggregate))
}

async fn submit_review(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
    Json(payload): Json<SubmitReview>,
) -> Result<(StatusCode, Json<ApiResponse<Review>>), ApiError> {
    let review = deployment
        .reviews()
        .submit_review(proposal_id, &principal, &payload)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(review))))
}

async fn list_reviews(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Review>>>, ApiError> {
    let reviews = deployment
        .reviews()
        .list_reviews(proposal_id, &principal)
        .await?;
    Ok(Json(ApiResponse::success(reviews)))
}

async fn my_review(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Option<Review>>>, ApiError> {
    let review = deployment.reviews().my_review(proposal_id, &principal).await?;
    Ok(Json(ApiResponse::success(review)))
}

async fn get_aggregate(
    State(deployment): State<DeploymentImpl>,
    Caller(principal): Caller,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReviewAggregate>>, ApiError> {
    let aggregate = deployment
        .reviews()
        .get_aggregate(proposal_id, &principal)
        .await?;
    Ok(Json(ApiResponse::success(aggregate)))
}
