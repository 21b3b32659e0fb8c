use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use futures::stream::BoxStream;
use services::services::{
    activity_feed::ActivityFeedService,
    config::{Config, load_config_from_file, save_config_to_file},
    confirmation::ConfirmationService,
    deliberation::DeliberationService,
    notifications::{NotificationRequest, NotificationService},
    publication::PublicationService,
    reviews::ReviewService,
};
use utils::assets::config_path;

use crate::notification_sink::BroadcastNotificationSink;

pub mod notification_sink;

#[derive(Clone)]
pub struct LocalDeployment {
    db: DBService,
    sink: Arc<BroadcastNotificationSink>,
    reviews: ReviewService,
    deliberation: DeliberationService,
    publication: PublicationService,
    confirmation: ConfirmationService,
    activity_feed: ActivityFeedService,
    notifications: NotificationService,
}

impl LocalDeployment {
    /// Wire every service onto an open database.
    pub fn from_parts(db: DBService, config: Config) -> Self {
        let sink = Arc::new(BroadcastNotificationSink::new());

        let reviews = ReviewService::new(db.clone());
        let deliberation = DeliberationService::new(db.clone(), config.bulk.max_proposals);
        let publication =
            PublicationService::new(db.clone(), sink.clone(), config.notifications.enabled);
        let confirmation = ConfirmationService::new(db.clone());
        let activity_feed = ActivityFeedService::new(db.clone(), config.timeline.page_size);
        let notifications =
            NotificationService::new(db.clone(), config.notifications.max_delivery_attempts);

        Self {
            db,
            sink,
            reviews,
            deliberation,
            publication,
            confirmation,
            activity_feed,
            notifications,
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config_path = config_path()?;
        let config = load_config_from_file(&config_path).await;
        // Persist so defaults added since the last run show up in the file.
        save_config_to_file(&config, &config_path).await?;

        let db = DBService::new().await?;
        tracing::info!(
            max_bulk = config.bulk.max_proposals,
            page_size = config.timeline.page_size,
            dispatch = config.notifications.enabled,
            "Local deployment ready"
        );

        Ok(Self::from_parts(db, config))
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn reviews(&self) -> &ReviewService {
        &self.reviews
    }

    fn deliberation(&self) -> &DeliberationService {
        &self.deliberation
    }

    fn publication(&self) -> &PublicationService {
        &self.publication
    }

    fn confirmation(&self) -> &ConfirmationService {
        &self.confirmation
    }

    fn activity_feed(&self) -> &ActivityFeedService {
        &self.activity_feed
    }

    fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    fn subscribe_notifications(&self) -> BoxStream<'static, NotificationRequest> {
        self.sink.subscribe()
    }
}
