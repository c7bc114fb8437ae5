//! Events that drive moderation transitions.

use chrono::{DateTime, Utc};

use super::state::Verdict;
use crate::ids::{AccountId, ReviewId};
use crate::review::Source;

/// Everything a reviewer hands in about a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDraft {
    pub verdict: Verdict,
    /// 0 to 100 inclusive.
    pub confidence: u32,
    pub notes: Option<String>,
    pub sources: Vec<Source>,
    pub tags: Vec<String>,
}

/// All events that can trigger moderation transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationEvent {
    /// A reviewer submitted a decision.
    ReviewSubmitted {
        /// Id for the review record the transition will emit.
        review_id: ReviewId,
        reviewer: AccountId,
        draft: ReviewDraft,
        at: DateTime<Utc>,
    },
}
