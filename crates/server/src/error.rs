use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use deployment::DeploymentError;
use services::services::workflow_error::{ErrorKind, WorkflowError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Bad Request: {0}")]
    BadRequest(String),
}

fn workflow_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::RequiresConfirmation => StatusCode::PRECONDITION_REQUIRED,
        ErrorKind::StoreError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let response = match &self {
            ApiError::Workflow(err) => {
                let kind = err.kind();
                let message = if kind == ErrorKind::StoreError {
                    tracing::error!(error = %err, "Workflow store failure");
                    "The proposal store is unavailable, please retry.".to_string()
                } else {
                    err.to_string()
                };
                let body =
                    ApiResponse::<()>::error_with_data(&message, serde_json::json!({ "kind": kind }));
                (workflow_status(kind), Json(body))
            }
            ApiError::Deployment(err) => {
                tracing::error!(error = %err, "Deployment failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error(&format!("DeploymentError: {}", err))),
                )
            }
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, Json(ApiResponse::<()>::error(msg)))
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::error(msg)))
            }
        };
        response.into_response()
    }
}
