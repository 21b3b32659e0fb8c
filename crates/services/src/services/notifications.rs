//! Speaker notification hand-off.
//!
//! Publishing writes one outbox row per speaker inside its transaction and,
//! after commit, hands a [`NotificationRequest`] per row to the configured
//! [`NotificationSink`]. Rendering and transport live behind the sink; the
//! delivery worker reports the outcome back through [`NotificationService`].

use async_trait::async_trait;
use db::{
    DBService,
    models::{
        notification::{OutboxNotification, TemplateKind},
        proposal::{Decision, Proposal},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{principal::Principal, workflow_error::WorkflowError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NotificationRequest {
    pub notification_id: Uuid,
    pub template_kind: TemplateKind,
    pub proposal_id: Uuid,
    pub speaker_id: String,
    pub decision: Decision,
}

impl From<&OutboxNotification> for NotificationRequest {
    fn from(row: &OutboxNotification) -> Self {
        Self {
            notification_id: row.id,
            template_kind: row.template_kind,
            proposal_id: row.proposal_id,
            speaker_id: row.speaker_id.clone(),
            decision: row.decision,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("No delivery worker is listening")]
    NoSubscriber,
    #[error("Notification hand-off failed: {0}")]
    Handoff(String),
}

/// Receiver of committed notification requests.
///
/// Errors are logged by the caller and never undo the publication; the
/// outbox row stays `pending` and can be picked up later.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(&self, request: NotificationRequest) -> Result<(), NotificationError>;
}

/// Hand every request to `sink`, logging failures.
pub async fn dispatch_all(sink: &dyn NotificationSink, requests: Vec<NotificationRequest>) {
    for request in requests {
        let notification_id = request.notification_id;
        let proposal_id = request.proposal_id;
        if let Err(e) = sink.dispatch(request).await {
            warn!(
                notification_id = %notification_id,
                proposal_id = %proposal_id,
                error = %e,
                "Notification hand-off failed, left pending in outbox"
            );
        }
    }
}

/// Delivery bookkeeping on the outbox.
#[derive(Clone)]
pub struct NotificationService {
    db: DBService,
    max_delivery_attempts: i64,
}

impl NotificationService {
    pub fn new(db: DBService, max_delivery_attempts: i64) -> Self {
        Self {
            db,
            max_delivery_attempts: max_delivery_attempts.max(1),
        }
    }

    /// Delivery status of every notification ever queued for a proposal.
    pub async fn delivery_status(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
    ) -> Result<Vec<OutboxNotification>, WorkflowError> {
        principal.require_team_member()?;
        Proposal::find_by_id(&self.db.pool, proposal_id)
            .await?
            .ok_or(WorkflowError::NotFound("Proposal"))?;
        let notifications = OutboxNotification::find_by_proposal(&self.db.pool, proposal_id).await?;
        debug!(proposal_id = %proposal_id, count = notifications.len(), "Loaded delivery status");
        Ok(notifications)
    }

    pub async fn pending(&self, limit: i64) -> Result<Vec<NotificationRequest>, WorkflowError> {
        let rows = OutboxNotification::find_pending(&self.db.pool, limit.clamp(1, 500)).await?;
        Ok(rows.iter().map(NotificationRequest::from).collect())
    }

    pub async fn report_delivered(
        &self,
        notification_id: Uuid,
        principal: &Principal,
    ) -> Result<OutboxNotification, WorkflowError> {
        principal.require_organizer()?;
        let row = OutboxNotification::mark_delivered(&self.db.pool, notification_id).await?;
        info!(
            notification_id = %notification_id,
            proposal_id = %row.proposal_id,
            "Notification delivered"
        );
        Ok(row)
    }

    pub async fn report_failed(
        &self,
        notification_id: Uuid,
        principal: &Principal,
        error: &str,
    ) -> Result<OutboxNotification, WorkflowError> {
        principal.require_organizer()?;
        if error.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "a failure report needs an error message".into(),
            ));
        }
        let row = OutboxNotification::mark_failed(
            &self.db.pool,
            notification_id,
            error,
            self.max_delivery_attempts,
        )
        .await?;
        warn!(
            notification_id = %notification_id,
            attempts = row.attempts,
            status = ?row.status,
            error = %error,
            "Notification delivery failed"
        );
        Ok(row)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every request; optionally refuses them all.
    #[derive(Default)]
    pub struct RecordingSink {
        pub received: Mutex<Vec<NotificationRequest>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                received: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn requests(&self) -> Vec<NotificationRequest> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn dispatch(&self, request: NotificationRequest) -> Result<(), NotificationError> {
            self.received.lock().unwrap().push(request);
            if self.fail {
                return Err(NotificationError::Handoff("mail relay down".into()));
            }
            Ok(())
        }
    }
}
