use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use services::services::notifications::{NotificationError, NotificationRequest, NotificationSink};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

const CHANNEL_CAPACITY: usize = 1024;

/// Fans committed notification requests out to connected delivery workers.
pub struct BroadcastNotificationSink {
    sender: broadcast::Sender<NotificationRequest>,
}

impl BroadcastNotificationSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> BoxStream<'static, NotificationRequest> {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(request) => Some(request),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        // Skipped rows are still pending in the outbox.
                        tracing::warn!(skipped, "Notification subscriber lagged");
                        None
                    }
                }
            })
            .boxed()
    }
}

impl Default for BroadcastNotificationSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotificationSink {
    async fn dispatch(&self, request: NotificationRequest) -> Result<(), NotificationError> {
        self.sender
            .send(request)
            .map(|receivers| {
                tracing::debug!(receivers, "Notification handed off");
            })
            .map_err(|_| NotificationError::NoSubscriber)
    }
}

#[cfg(test)]
mod tests {
    use db::models::{notification::TemplateKind, proposal::Decision};
    use uuid::Uuid;

    use super::*;

    fn request(speaker_id: &str) -> NotificationRequest {
        NotificationRequest {
            notification_id: Uuid::new_v4(),
            template_kind: TemplateKind::ProposalRejected,
            proposal_id: Uuid::new_v4(),
            speaker_id: speaker_id.into(),
            decision: Decision::Rejected,
        }
    }

    #[tokio::test]
    async fn dispatch_without_worker_reports_no_subscriber() {
        let sink = BroadcastNotificationSink::new();
        assert!(matches!(
            sink.dispatch(request("ada")).await,
            Err(NotificationError::NoSubscriber)
        ));
    }

    #[tokio::test]
    async fn subscribers_receive_requests_in_order() {
        let sink = BroadcastNotificationSink::new();
        let mut stream = sink.subscribe();

        sink.dispatch(request("ada")).await.unwrap();
        sink.dispatch(request("grace")).await.unwrap();

        assert_eq!(stream.next().await.unwrap().speaker_id, "ada");
        assert_eq!(stream.next().await.unwrap().speaker_id, "grace");
    }
}
