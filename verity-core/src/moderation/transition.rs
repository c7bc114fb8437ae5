//! Pure moderation transition function.
//!
//! Given the current state of a post and an event, returns the new state and
//! the effects to execute. This function has NO side effects.

use thiserror::Error;

use super::effect::{LogLevel, ModerationEffect};
use super::event::{ModerationEvent, ReviewDraft};
use super::state::{ModerationState, VerificationStatus};
use crate::ids::{AccountId, PostId};
use crate::review::Review;
use crate::social::NotificationKind;
use crate::{char_len, NOTES_MAX_LEN};

/// The post being moderated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostContext {
    pub post: PostId,
    pub author: AccountId,
}

/// Why a decision was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("You cannot review your own posts. This post will be assigned to another reviewer.")]
    SelfReview,

    #[error("Post has already been {0}")]
    AlreadyReviewed(VerificationStatus),

    #[error("Confidence must be between 0 and 100, got {0}")]
    InvalidConfidence(u32),

    #[error("Review notes must be at most {NOTES_MAX_LEN} characters")]
    NotesTooLong,
}

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub state: ModerationState,
    pub effects: Vec<ModerationEffect>,
}

impl TransitionResult {
    pub fn new(state: ModerationState, effects: Vec<ModerationEffect>) -> Self {
        Self { state, effects }
    }
}

pub fn transition(
    state: ModerationState,
    ctx: &PostContext,
    event: ModerationEvent,
) -> Result<TransitionResult, TransitionError> {
    match event {
        ModerationEvent::ReviewSubmitted {
            review_id,
            reviewer,
            draft,
            at,
        } => {
            validate_draft(&draft)?;
            if reviewer == ctx.author {
                return Err(TransitionError::SelfReview);
            }
            if !state.is_pending() {
                return Err(TransitionError::AlreadyReviewed(state.status()));
            }

            let approved = draft.verdict.approves();
            let notes = draft.notes.filter(|n| !n.trim().is_empty());
            let new_state = if approved {
                ModerationState::Approved {
                    reviewed_by: reviewer,
                    reviewed_at: at,
                    notes: notes.clone(),
                }
            } else {
                ModerationState::Rejected {
                    reviewed_by: reviewer,
                    reviewed_at: at,
                    notes: notes.clone(),
                    verdict: draft.verdict,
                }
            };

            let review = Review {
                id: review_id,
                post: ctx.post,
                reviewer,
                verdict: draft.verdict,
                notes,
                // validate_draft bounds it to 0..=100
                confidence: draft.confidence as u8,
                sources: draft.sources,
                tags: draft.tags,
                created_at: at,
            };

            let (kind, title, message) = if approved {
                (
                    NotificationKind::PostApproved,
                    "Post approved",
                    "Your post was verified by a reviewer and is now visible in the feed.".to_string(),
                )
            } else {
                (
                    NotificationKind::PostRejected,
                    "Post rejected",
                    format!("A reviewer marked your post as {}.", draft.verdict),
                )
            };

            let effects = vec![
                ModerationEffect::RecordReview(review),
                ModerationEffect::UpdateReviewerStats {
                    reviewer,
                    approved,
                    at,
                },
                ModerationEffect::NotifyAuthor {
                    author: ctx.author,
                    reviewer,
                    post: ctx.post,
                    kind,
                    title: title.to_string(),
                    message,
                },
                ModerationEffect::Log {
                    level: LogLevel::Info,
                    message: format!(
                        "Post {} {} by reviewer {} ({})",
                        ctx.post,
                        new_state.status(),
                        reviewer,
                        draft.verdict
                    ),
                },
            ];

            Ok(TransitionResult::new(new_state, effects))
        }
    }
}

fn validate_draft(draft: &ReviewDraft) -> Result<(), TransitionError> {
    if draft.confidence > 100 {
        return Err(TransitionError::InvalidConfidence(draft.confidence));
    }
    if draft.notes.as_deref().is_some_and(|n| char_len(n) > NOTES_MAX_LEN) {
        return Err(TransitionError::NotesTooLong);
    }
    Ok(())
}
