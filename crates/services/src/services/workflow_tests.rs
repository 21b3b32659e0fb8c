use std::sync::Arc;

use db::{
    DBService,
    models::{
        proposal::{ConfirmationStatus, Decision, DeliberationStatus, Proposal, PublicationStatus},
        review::Feeling,
        test_utils::{create_test_event, create_test_proposal, setup_test_pool},
    },
};
use futures::TryStreamExt;

use super::{
    activity_feed::{ActivityFeedService, TimelineAudience},
    confirmation::ConfirmationService,
    deliberation::{DeliberationService, SetStatus},
    notifications::testing::RecordingSink,
    principal::{Principal, Role},
    publication::PublicationService,
    reviews::{ReviewService, SubmitReview},
    workflow_error::WorkflowError,
};

#[tokio::test]
async fn review_decide_publish_decline_and_redecide() {
    let pool = setup_test_pool().await;
    let event = create_test_event(&pool).await;
    let p1 = create_test_proposal(&pool, event.id, &["ada", "grace"]).await;
    let db = DBService::from_pool(pool);

    let sink = Arc::new(RecordingSink::default());
    let reviews = ReviewService::new(db.clone());
    let deliberation = DeliberationService::new(db.clone(), 100);
    let publication = PublicationService::new(db.clone(), sink.clone(), true);
    let confirmation = ConfirmationService::new(db.clone());
    let feed = ActivityFeedService::new(db.clone(), 3);

    let org = Principal::new("org", Role::Organizer);
    let ada = Principal::new("ada", Role::Speaker);

    for (reviewer, note, feeling) in [
        ("r1", 4, Feeling::Positive),
        ("r2", 2, Feeling::Negative),
    ] {
        reviews
            .submit_review(
                p1.id,
                &Principal::new(reviewer, Role::Reviewer),
                &SubmitReview {
                    note: Some(note),
                    feeling,
                },
            )
            .await
            .unwrap();
    }
    let aggregate = reviews.get_aggregate(p1.id, &org).await.unwrap();
    assert_eq!(aggregate.average_note, Some(3.0));
    assert_eq!(aggregate.count_for(Feeling::Positive), 1);
    assert_eq!(aggregate.count_for(Feeling::Negative), 1);
    assert_eq!(aggregate.feeling_counts.len(), 2);
    assert_eq!(aggregate.reviewer_count, 2);

    let accepted = deliberation
        .set_status(
            p1.id,
            &org,
            &SetStatus {
                status: DeliberationStatus::Accepted,
                confirm_republication: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(accepted.deliberation_status, DeliberationStatus::Accepted);

    let result = publication
        .publish(event.id, &org, Decision::Accepted)
        .await
        .unwrap();
    assert_eq!(result.published_count, 1);
    let published = Proposal::find_by_id(&db.pool, p1.id).await.unwrap().unwrap();
    assert_eq!(published.publication_status, PublicationStatus::Published);
    assert_eq!(published.confirmation_status, ConfirmationStatus::Pending);
    assert_eq!(sink.requests().len(), 2);

    let declined = confirmation.decline(p1.id, &ada).await.unwrap();
    assert_eq!(declined.confirmation_status, ConfirmationStatus::Declined);

    let guarded = deliberation
        .set_status(
            p1.id,
            &org,
            &SetStatus {
                status: DeliberationStatus::Rejected,
                confirm_republication: false,
            },
        )
        .await;
    assert!(matches!(guarded, Err(WorkflowError::RequiresConfirmation)));

    let redecided = deliberation
        .set_status(
            p1.id,
            &org,
            &SetStatus {
                status: DeliberationStatus::Rejected,
                confirm_republication: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(redecided.deliberation_status, DeliberationStatus::Rejected);
    assert_eq!(redecided.publication_status, PublicationStatus::NotPublished);
    assert_eq!(redecided.confirmation_status, ConfirmationStatus::Pending);

    // A new epoch publishes again and notifies again.
    let rejected = publication
        .publish(event.id, &org, Decision::Rejected)
        .await
        .unwrap();
    assert_eq!(rejected.published_count, 1);
    assert_eq!(sink.requests().len(), 4);

    let tags: Vec<&'static str> = feed
        .timeline(p1.id, TimelineAudience::Organizer)
        .map_ok(|entry| entry.kind.tag())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(
        tags,
        vec![
            "review_submitted",
            "review_submitted",
            "status_changed",
            "result_published",
            "confirmation_changed",
            "status_changed",
            "result_published",
        ]
    );

    let speaker_view: Vec<_> = feed
        .timeline(p1.id, TimelineAudience::Speaker)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(speaker_view.len(), 3);
}
