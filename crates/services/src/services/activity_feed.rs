//! Per-proposal timeline of reviews, comments and workflow changes.
//!
//! Entries are only ever appended, by the transaction of the mutation they
//! describe. Reading is a lazy stream over keyset pages on `seq`.

use async_stream::stream;
use db::{
    DBService,
    models::{
        activity::{ActivityEntry, ActivityKind},
        proposal::Proposal,
    },
};
use futures::{StreamExt, stream::BoxStream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    principal::{Principal, Role},
    workflow_error::WorkflowError,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TimelineAudience {
    Organizer,
    Speaker,
}

impl TimelineAudience {
    pub fn can_see(&self, kind: &ActivityKind) -> bool {
        match self {
            TimelineAudience::Organizer => true,
            TimelineAudience::Speaker => matches!(
                kind,
                ActivityKind::ResultPublished { .. } | ActivityKind::ConfirmationChanged { .. }
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct PostComment {
    pub text: String,
}

pub type Timeline = BoxStream<'static, Result<ActivityEntry, WorkflowError>>;

#[derive(Clone)]
pub struct ActivityFeedService {
    db: DBService,
    page_size: i64,
}

impl ActivityFeedService {
    pub fn new(db: DBService, page_size: i64) -> Self {
        Self {
            db,
            page_size: page_size.max(1),
        }
    }

    /// Timeline as seen by `principal`: the team sees everything, a speaker
    /// of the proposal only the outcome entries. Only entries with a `seq`
    /// above `after_seq` are streamed.
    pub async fn timeline_for(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
        after_seq: i64,
    ) -> Result<Timeline, WorkflowError> {
        let proposal = Proposal::find_by_id(&self.db.pool, proposal_id)
            .await?
            .ok_or(WorkflowError::NotFound("Proposal"))?;
        let audience = match principal.role {
            Role::Organizer | Role::Reviewer => TimelineAudience::Organizer,
            Role::Speaker if proposal.has_speaker(&principal.id) => TimelineAudience::Speaker,
            Role::Speaker => {
                return Err(WorkflowError::Forbidden(format!(
                    "'{}' is not a speaker of this proposal",
                    principal.id
                )));
            }
        };
        debug!(proposal_id = %proposal_id, audience = ?audience, after_seq, "Streaming timeline");
        Ok(self.timeline_after(proposal_id, audience, after_seq))
    }

    pub fn timeline(&self, proposal_id: Uuid, audience: TimelineAudience) -> Timeline {
        self.timeline_after(proposal_id, audience, 0)
    }

    /// Ascending commit order. Each page only asks for rows after the last
    /// `seq` already yielded, so concurrent appends land at the end and a
    /// reader can resume from the last `seq` it saw.
    pub fn timeline_after(
        &self,
        proposal_id: Uuid,
        audience: TimelineAudience,
        after_seq: i64,
    ) -> Timeline {
        let pool = self.db.pool.clone();
        let page_size = self.page_size;

        stream! {
            let mut after_seq = after_seq;
            loop {
                let page = match ActivityEntry::find_page(&pool, proposal_id, after_seq, page_size).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(WorkflowError::from(e));
                        break;
                    }
                };
                let exhausted = (page.len() as i64) < page_size;
                for entry in page {
                    after_seq = entry.seq;
                    if audience.can_see(&entry.kind) {
                        yield Ok(entry);
                    }
                }
                if exhausted {
                    break;
                }
            }
        }
        .boxed()
    }

    pub async fn post_comment(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
        data: &PostComment,
    ) -> Result<ActivityEntry, WorkflowError> {
        principal.require_team_member()?;
        let text = data.text.trim();
        if text.is_empty() {
            return Err(WorkflowError::InvalidInput("comment text is empty".into()));
        }

        let mut tx = self.db.begin_write().await?;
        Proposal::find_by_id(&mut *tx, proposal_id)
            .await?
            .ok_or(WorkflowError::NotFound("Proposal"))?;
        let entry = ActivityEntry::append(
            &mut *tx,
            proposal_id,
            &ActivityKind::CommentPosted {
                author_id: principal.id.clone(),
                text: text.to_string(),
            },
        )
        .await?;
        tx.commit().await?;

        info!(proposal_id = %proposal_id, entry_id = %entry.id, author_id = %principal.id, "Comment posted");
        Ok(entry)
    }

    /// Retract a comment by appending a `CommentDeleted` marker.
    pub async fn delete_comment(
        &self,
        proposal_id: Uuid,
        principal: &Principal,
        entry_id: Uuid,
    ) -> Result<ActivityEntry, WorkflowError> {
        let mut tx = self.db.begin_write().await?;

        let target = ActivityEntry::find_by_id(&mut *tx, entry_id)
            .await?
            .filter(|entry| entry.proposal_id == proposal_id)
            .ok_or(WorkflowError::NotFound("Activity entry"))?;
        let ActivityKind::CommentPosted { author_id, .. } = &target.kind else {
            return Err(WorkflowError::InvalidInput(format!(
                "entry {entry_id} is a {}, not a comment",
                target.kind.tag()
            )));
        };
        if author_id != &principal.id {
            return Err(WorkflowError::Forbidden(
                "only the author can delete a comment".into(),
            ));
        }
        if ActivityEntry::is_comment_deleted(&mut *tx, proposal_id, entry_id).await? {
            return Err(WorkflowError::InvalidState(
                "comment was already deleted".into(),
            ));
        }

        let marker =
            ActivityEntry::append(&mut *tx, proposal_id, &ActivityKind::CommentDeleted { entry_id })
                .await?;
        tx.commit().await?;

        info!(proposal_id = %proposal_id, entry_id = %entry_id, "Comment deleted");
        Ok(marker)
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        proposal::{ConfirmationStatus, Decision},
        test_utils::{
            create_test_event, create_test_proposal, setup_file_test_db, setup_test_pool,
        },
    };
    use futures::TryStreamExt;

    use super::*;

    async fn setup(page_size: i64) -> (ActivityFeedService, DBService, Proposal) {
        let pool = setup_test_pool().await;
        let event = create_test_event(&pool).await;
        let proposal = create_test_proposal(&pool, event.id, &["ada"]).await;
        let db = DBService::from_pool(pool);
        (ActivityFeedService::new(db.clone(), page_size), db, proposal)
    }

    fn comment(text: &str) -> PostComment {
        PostComment { text: text.into() }
    }

    #[tokio::test]
    async fn timeline_streams_every_page_in_order() {
        let (service, _, proposal) = setup(2).await;
        let org = Principal::new("org", Role::Organizer);
        for i in 0..5 {
            service
                .post_comment(proposal.id, &org, &comment(&format!("note {i}")))
                .await
                .unwrap();
        }

        let entries: Vec<ActivityEntry> = service
            .timeline(proposal.id, TimelineAudience::Organizer)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(entries.len(), 5);
        assert!(entries.windows(2).all(|pair| pair[0].seq < pair[1].seq));
        assert!(matches!(
            &entries[4].kind,
            ActivityKind::CommentPosted { text, .. } if text == "note 4"
        ));
    }

    #[tokio::test]
    async fn speakers_only_see_outcomes() {
        let (service, db, proposal) = setup(10).await;
        service
            .post_comment(proposal.id, &Principal::new("org", Role::Organizer), &comment("internal"))
            .await
            .unwrap();
        for kind in [
            ActivityKind::ResultPublished {
                decision: Decision::Accepted,
            },
            ActivityKind::ConfirmationChanged {
                speaker_id: "ada".into(),
                status: ConfirmationStatus::Confirmed,
            },
        ] {
            ActivityEntry::append(&db.pool, proposal.id, &kind).await.unwrap();
        }

        let speaker_view: Vec<ActivityEntry> = service
            .timeline_for(proposal.id, &Principal::new("ada", Role::Speaker), 0)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(speaker_view.len(), 2);
        assert!(
            speaker_view
                .iter()
                .all(|e| !matches!(e.kind, ActivityKind::CommentPosted { .. }))
        );

        assert!(matches!(
            service
                .timeline_for(proposal.id, &Principal::new("eve", Role::Speaker), 0)
                .await,
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn comments_are_deleted_once_by_their_author() {
        let (service, db, proposal) = setup(10).await;
        let author = Principal::new("org", Role::Organizer);
        let posted = service
            .post_comment(proposal.id, &author, &comment("  needs a demo  "))
            .await
            .unwrap();
        assert!(matches!(
            &posted.kind,
            ActivityKind::CommentPosted { text, .. } if text == "needs a demo"
        ));

        assert!(matches!(
            service
                .delete_comment(proposal.id, &Principal::new("rev", Role::Reviewer), posted.id)
                .await,
            Err(WorkflowError::Forbidden(_))
        ));

        let marker = service
            .delete_comment(proposal.id, &author, posted.id)
            .await
            .unwrap();
        assert_eq!(marker.kind, ActivityKind::CommentDeleted { entry_id: posted.id });

        assert!(matches!(
            service.delete_comment(proposal.id, &author, posted.id).await,
            Err(WorkflowError::InvalidState(_))
        ));
        assert!(matches!(
            service.delete_comment(proposal.id, &author, marker.id).await,
            Err(WorkflowError::InvalidInput(_))
        ));
        assert!(matches!(
            service.delete_comment(Uuid::new_v4(), &author, posted.id).await,
            Err(WorkflowError::NotFound(_))
        ));

        let count = ActivityEntry::find_page(&db.pool, proposal.id, 0, 10)
            .await
            .unwrap()
            .len();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn comment_validation() {
        let (service, _, proposal) = setup(10).await;
        assert!(matches!(
            service
                .post_comment(proposal.id, &Principal::new("org", Role::Organizer), &comment("   "))
                .await,
            Err(WorkflowError::InvalidInput(_))
        ));
        assert!(matches!(
            service
                .post_comment(proposal.id, &Principal::new("ada", Role::Speaker), &comment("hi"))
                .await,
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn timeline_resumes_after_a_known_seq() {
        let (service, _, proposal) = setup(2).await;
        let org = Principal::new("org", Role::Organizer);
        for i in 0..5 {
            service
                .post_comment(proposal.id, &org, &comment(&format!("note {i}")))
                .await
                .unwrap();
        }

        let first: Vec<ActivityEntry> = service
            .timeline_for(proposal.id, &org, 0)
            .await
            .unwrap()
            .take(3)
            .try_collect()
            .await
            .unwrap();
        let rest: Vec<ActivityEntry> = service
            .timeline_for(proposal.id, &org, first[2].seq)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|entry| entry.seq > first[2].seq));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_comments_keep_commit_order() {
        let file = setup_file_test_db().await;
        let event = create_test_event(&file.db.pool).await;
        let proposal_id = create_test_proposal(&file.db.pool, event.id, &["ada"]).await.id;
        let service = ActivityFeedService::new(file.db.clone(), 4);

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .post_comment(
                            proposal_id,
                            &Principal::new(format!("rev-{i}"), Role::Reviewer),
                            &comment("looks good"),
                        )
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let entries: Vec<ActivityEntry> = service
            .timeline(proposal_id, TimelineAudience::Organizer)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(entries.len(), 12);
        assert!(entries.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    }
}
