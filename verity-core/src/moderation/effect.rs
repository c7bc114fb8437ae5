//! Effects (side effects as data).
//!
//! Effects describe what should happen as a result of a moderation decision.
//! The server's interpreter executes them against storage, which keeps the
//! transition rules testable without a database.

use chrono::{DateTime, Utc};

use crate::ids::{AccountId, PostId};
use crate::review::Review;
use crate::social::NotificationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

/// All effects a moderation transition can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationEffect {
    /// Persist the review record.
    RecordReview(Review),

    /// Tell the author how their post was judged.
    NotifyAuthor {
        author: AccountId,
        reviewer: AccountId,
        post: PostId,
        kind: NotificationKind,
        title: String,
        message: String,
    },

    /// Bump the reviewer's running counters.
    UpdateReviewerStats {
        reviewer: AccountId,
        approved: bool,
        at: DateTime<Utc>,
    },

    Log { level: LogLevel, message: String },
}
