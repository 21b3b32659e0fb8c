use anyhow::Error as AnyhowError;
use async_trait::async_trait;
use axum::response::sse::Event;
use db::DBService;
use futures::{StreamExt, stream::BoxStream};
use services::services::{
    activity_feed::ActivityFeedService,
    config::ConfigError,
    confirmation::ConfirmationService,
    deliberation::DeliberationService,
    notifications::{NotificationRequest, NotificationService},
    publication::PublicationService,
    reviews::ReviewService,
    workflow_error::WorkflowError,
};
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Pending outbox rows replayed to a delivery worker when it connects.
const PENDING_REPLAY_LIMIT: i64 = 500;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn db(&self) -> &DBService;

    fn reviews(&self) -> &ReviewService;

    fn deliberation(&self) -> &DeliberationService;

    fn publication(&self) -> &PublicationService;

    fn confirmation(&self) -> &ConfirmationService;

    fn activity_feed(&self) -> &ActivityFeedService;

    fn notifications(&self) -> &NotificationService;

    /// Requests handed to the sink from now on.
    fn subscribe_notifications(&self) -> BoxStream<'static, NotificationRequest>;

    /// Server-sent events for the delivery worker: every pending outbox row
    /// first, then live requests as publications commit. A request may show
    /// up twice; workers report by notification id, which is idempotent.
    async fn stream_notifications(
        &self,
    ) -> Result<BoxStream<'static, Result<Event, std::io::Error>>, DeploymentError> {
        let live = self.subscribe_notifications();
        let pending = self.notifications().pending(PENDING_REPLAY_LIMIT).await?;
        tracing::debug!(pending = pending.len(), "Delivery worker subscribed");

        Ok(futures::stream::iter(pending)
            .chain(live)
            .map(|request| {
                Event::default()
                    .event("notification")
                    .id(request.notification_id.to_string())
                    .json_data(&request)
                    .map_err(std::io::Error::other)
            })
            .boxed())
    }
}
