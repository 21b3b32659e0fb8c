use db::models::{
    activity::ActivityError, event::EventError, notification::NotificationOutboxError,
    proposal::ProposalError, review::ReviewError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error(
        "This proposal was already published; confirm to re-decide and notify speakers again"
    )]
    RequiresConfirmation,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::Forbidden(_) => ErrorKind::Forbidden,
            WorkflowError::InvalidInput(_) => ErrorKind::InvalidInput,
            WorkflowError::InvalidState(_) => ErrorKind::InvalidState,
            WorkflowError::RequiresConfirmation => ErrorKind::RequiresConfirmation,
            WorkflowError::Conflict(_) => ErrorKind::Conflict,
            WorkflowError::Database(_) => ErrorKind::StoreError,
        }
    }

    pub(crate) fn lost_update(proposal_id: uuid::Uuid) -> Self {
        WorkflowError::Conflict(format!(
            "proposal {proposal_id} was modified concurrently, reload and retry"
        ))
    }
}

/// Machine readable error class, also used as the per-item skip reason of
/// bulk operations.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidInput,
    InvalidState,
    RequiresConfirmation,
    Conflict,
    StoreError,
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        // SQLITE_BUSY, SQLITE_LOCKED and SQLITE_BUSY_SNAPSHOT: another writer
        // committed to the rows this transaction read.
        if let sqlx::Error::Database(db_err) = &err
            && matches!(db_err.code().as_deref(), Some("5" | "6" | "517"))
        {
            return WorkflowError::Conflict(db_err.message().to_string());
        }
        WorkflowError::Database(err)
    }
}

impl From<ProposalError> for WorkflowError {
    fn from(err: ProposalError) -> Self {
        match err {
            ProposalError::Database(e) => e.into(),
            ProposalError::NotFound => WorkflowError::NotFound("Proposal"),
        }
    }
}

impl From<EventError> for WorkflowError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::Database(e) => e.into(),
            EventError::NotFound => WorkflowError::NotFound("Event"),
        }
    }
}

impl From<ReviewError> for WorkflowError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::Database(e) => e.into(),
            ReviewError::NotFound => WorkflowError::NotFound("Review"),
        }
    }
}

impl From<ActivityError> for WorkflowError {
    fn from(err: ActivityError) -> Self {
        match err {
            ActivityError::Database(e) => e.into(),
            ActivityError::NotFound => WorkflowError::NotFound("Activity entry"),
        }
    }
}

impl From<NotificationOutboxError> for WorkflowError {
    fn from(err: NotificationOutboxError) -> Self {
        match err {
            NotificationOutboxError::Database(e) => e.into(),
            NotificationOutboxError::NotFound => WorkflowError::NotFound("Notification"),
            NotificationOutboxError::AlreadyDelivered => {
                WorkflowError::InvalidState("notification was already delivered".into())
            }
        }
    }
}
