//! Effect interpreter for moderation decisions.
//!
//! The pure transition in `verity_core::moderation` decides what a review
//! does to a post; this module writes the new post state and then executes
//! the effects it asked for.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::repository::{modify, Repository, RepositoryError};
use verity_core::moderation::{
    transition, LogLevel, ModerationEffect, ModerationEvent, ModerationState, PostContext,
    ReviewDraft,
};
use verity_core::{Account, AccountId, Notification, Post, PostId, Review, ReviewId};

/// A post after a decision, together with the stored review.
#[derive(Debug, Clone)]
pub struct Decision {
    pub post: Post,
    pub review: Review,
}

/// Apply a reviewer's decision to a post.
///
/// The post's new state is written under revision control first; only a
/// successful write produces effects. If the review itself cannot be stored
/// the post goes back to pending so the decision can be retried.
pub async fn submit_review(
    repo: &dyn Repository,
    post_id: &PostId,
    reviewer: AccountId,
    draft: ReviewDraft,
    now: DateTime<Utc>,
) -> Result<Decision, ApiError> {
    record_decision(repo, post_id, reviewer, draft, ReviewId::new(), now).await
}

async fn record_decision(
    repo: &dyn Repository,
    post_id: &PostId,
    reviewer: AccountId,
    draft: ReviewDraft,
    review_id: ReviewId,
    now: DateTime<Utc>,
) -> Result<Decision, ApiError> {
    let outcome = modify::<Post, _, ApiError, _>(repo, post_id, |post| {
        let ctx = PostContext {
            post: post.id,
            author: post.author,
        };
        let event = ModerationEvent::ReviewSubmitted {
            review_id,
            reviewer,
            draft: draft.clone(),
            at: now,
        };
        let result = transition(post.moderation.clone(), &ctx, event)?;
        post.moderation = result.state;
        Ok(result.effects)
    })
    .await?;

    let Some((post, effects)) = outcome else {
        return Err(ApiError::not_found("Post not found"));
    };

    match execute_effects(repo, effects).await {
        Ok(Some(review)) => Ok(Decision { post, review }),
        Ok(None) => {
            reopen(repo, post_id, &post.moderation).await;
            Err(ApiError::Internal("decision produced no review".to_string()))
        }
        Err(e) => {
            error!("Failed to record review {} for post {}: {}", review_id, post_id, e);
            reopen(repo, post_id, &post.moderation).await;
            Err(e.into())
        }
    }
}

/// Return a decided post to pending, unless its state changed since `decided`.
async fn reopen(repo: &dyn Repository, post_id: &PostId, decided: &ModerationState) {
    let reopened = modify::<Post, _, RepositoryError, _>(repo, post_id, |post| {
        if post.moderation == *decided {
            post.moderation = ModerationState::Pending;
        }
        Ok(())
    })
    .await;
    match reopened {
        Ok(Some(_)) => warn!("Post {} is back in the review queue", post_id),
        Ok(None) => {}
        Err(e) => error!("Failed to reopen post {}: {}", post_id, e),
    }
}

/// Execute effects in order and return the recorded review, if any.
///
/// Only a failure to record the review is fatal; stats and notifications are
/// logged and skipped.
pub async fn execute_effects(
    repo: &dyn Repository,
    effects: Vec<ModerationEffect>,
) -> Result<Option<Review>, RepositoryError> {
    let mut recorded = None;

    for effect in effects {
        match effect {
            ModerationEffect::RecordReview(review) => {
                repo.insert_review(&review).await?;
                recorded = Some(review);
            }
            ModerationEffect::UpdateReviewerStats {
                reviewer,
                approved,
                at,
            } => {
                let updated = modify::<Account, _, RepositoryError, _>(repo, &reviewer, |account| {
                    account
                        .reviewer_stats
                        .get_or_insert_with(Default::default)
                        .record(approved, at);
                    account.updated_at = at;
                    Ok(())
                })
                .await;
                match updated {
                    Ok(Some(_)) => {}
                    Ok(None) => warn!("Reviewer {} vanished before stats update", reviewer),
                    Err(e) => error!("Failed to update stats for reviewer {}: {}", reviewer, e),
                }
            }
            ModerationEffect::NotifyAuthor {
                author,
                reviewer,
                post,
                kind,
                title,
                message,
            } => {
                let notification = Notification::new(author, kind, title, message, Utc::now())
                    .with_account(reviewer)
                    .with_post(post);
                if let Err(e) = repo.insert_notification(&notification).await {
                    error!("Failed to notify author {} about post {}: {}", author, post, e);
                }
            }
            ModerationEffect::Log { level, message } => match level {
                LogLevel::Info => info!("{}", message),
                LogLevel::Warn => warn!("{}", message),
            },
        }
    }

    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use verity_core::moderation::{VerificationStatus, Verdict};
    use verity_core::{NotificationKind, Role};

    struct Fixture {
        repo: InMemoryRepository,
        author: Account,
        reviewer: Account,
        post: Post,
    }

    async fn fixture() -> Fixture {
        let repo = InMemoryRepository::new();
        let now = Utc::now();
        let author = Account::new("author@example.com", String::new(), Role::User, "Ann Author", now);
        let reviewer =
            Account::new("rev@example.com", String::new(), Role::Reviewer, "Rita Reviewer", now);
        repo.insert_account(&author).await.unwrap();
        repo.insert_account(&reviewer).await.unwrap();
        let post = Post::new(author.id, Role::User, "The moon is made of rock", now).unwrap();
        repo.insert_post(&post).await.unwrap();
        Fixture {
            repo,
            author,
            reviewer,
            post,
        }
    }

    fn draft(verdict: Verdict) -> ReviewDraft {
        ReviewDraft {
            verdict,
            confidence: 90,
            notes: Some("checked".to_string()),
            sources: vec![],
            tags: vec!["science".to_string()],
        }
    }

    #[tokio::test]
    async fn test_approval_runs_every_effect() {
        let f = fixture().await;
        let decision = submit_review(
            &f.repo,
            &f.post.id,
            f.reviewer.id,
            draft(Verdict::Verified),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(decision.post.status(), VerificationStatus::Approved);
        assert_eq!(decision.review.post, f.post.id);
        assert_eq!(decision.review.confidence, 90);

        let stored = f.repo.get_post(&f.post.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), VerificationStatus::Approved);

        let reviews = f.repo.list_reviews_by_reviewer(&f.reviewer.id).await.unwrap();
        assert_eq!(reviews.len(), 1);

        let reviewer = f.repo.get_account(&f.reviewer.id).await.unwrap().unwrap();
        let stats = reviewer.reviewer_stats.unwrap();
        assert_eq!(stats.reviews_completed, 1);
        assert_eq!(stats.approved_count, 1);

        let notes = f.repo.list_notifications(&f.author.id, false).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::PostApproved);
        assert_eq!(notes[0].related_post, Some(f.post.id));
    }

    #[tokio::test]
    async fn test_rejection_counts_as_rejected() {
        let f = fixture().await;
        let decision = submit_review(
            &f.repo,
            &f.post.id,
            f.reviewer.id,
            draft(Verdict::Misleading),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(decision.post.status(), VerificationStatus::Rejected);

        let reviewer = f.repo.get_account(&f.reviewer.id).await.unwrap().unwrap();
        assert_eq!(reviewer.reviewer_stats.unwrap().rejected_count, 1);
        let notes = f.repo.list_notifications(&f.author.id, false).await.unwrap();
        assert_eq!(notes[0].kind, NotificationKind::PostRejected);
    }

    #[tokio::test]
    async fn test_second_decision_conflicts_and_writes_nothing() {
        let f = fixture().await;
        submit_review(&f.repo, &f.post.id, f.reviewer.id, draft(Verdict::Verified), Utc::now())
            .await
            .unwrap();
        let err = submit_review(&f.repo, &f.post.id, f.reviewer.id, draft(Verdict::False), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(m) if m == "Post has already been approved"));
        assert_eq!(
            f.repo.list_reviews_by_reviewer(&f.reviewer.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_review_write_reopens_post() {
        let f = fixture().await;
        let other = Post::new(f.author.id, Role::User, "Water boils at 100C", Utc::now()).unwrap();
        f.repo.insert_post(&other).await.unwrap();
        let taken = ReviewId::new();
        record_decision(&f.repo, &other.id, f.reviewer.id, draft(Verdict::Verified), taken, Utc::now())
            .await
            .unwrap();

        // the review id is already stored, so recording this decision fails
        let err = record_decision(&f.repo, &f.post.id, f.reviewer.id, draft(Verdict::False), taken, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        let stored = f.repo.get_post(&f.post.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), VerificationStatus::Pending);
        let reviewer = f.repo.get_account(&f.reviewer.id).await.unwrap().unwrap();
        assert_eq!(reviewer.reviewer_stats.unwrap().reviews_completed, 1);
        assert_eq!(f.repo.list_notifications(&f.author.id, false).await.unwrap().len(), 1);

        let decision = submit_review(&f.repo, &f.post.id, f.reviewer.id, draft(Verdict::False), Utc::now())
            .await
            .unwrap();
        assert_eq!(decision.post.status(), VerificationStatus::Rejected);
        assert_eq!(
            f.repo.list_reviews_by_reviewer(&f.reviewer.id).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_self_review_is_forbidden() {
        let f = fixture().await;
        let err = submit_review(&f.repo, &f.post.id, f.author.id, draft(Verdict::Verified), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        let stored = f.repo.get_post(&f.post.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), VerificationStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_post() {
        let f = fixture().await;
        let err = submit_review(&f.repo, &PostId::new(), f.reviewer.id, draft(Verdict::Verified), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
