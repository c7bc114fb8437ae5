//! Posts and the interactions recorded on them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{AccountId, CommentId, PostId};
use crate::media::MediaItem;
use crate::moderation::{ModerationState, VerificationStatus};
use crate::role::{ParseError, Role};
use crate::validate::{check_text, ValidationError};
use crate::{COMMENT_MAX_LEN, POST_CONTENT_MAX_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Connections,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Connections => "connections",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "connections" => Ok(Visibility::Connections),
            other => Err(ParseError::new("visibility", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportReason {
    Spam,
    Inappropriate,
    FalseInfo,
    Harassment,
    Other,
}

impl ReportReason {
    pub const ALL: [ReportReason; 5] = [
        ReportReason::Spam,
        ReportReason::Inappropriate,
        ReportReason::FalseInfo,
        ReportReason::Harassment,
        ReportReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportReason::Spam => "spam",
            ReportReason::Inappropriate => "inappropriate",
            ReportReason::FalseInfo => "false-info",
            ReportReason::Harassment => "harassment",
            ReportReason::Other => "other",
        }
    }
}

impl FromStr for ReportReason {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportReason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseError::new("report reason", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub user: AccountId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub user: AccountId,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub reported_by: AccountId,
    pub reason: ReportReason,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("You have already reported this post")]
    AlreadyReported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: AccountId,
    pub author_role: Role,
    pub content: String,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub moderation: ModerationState,
    #[serde(default)]
    pub likes: Vec<Like>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// A new pending post. `content` is trimmed and must be non-empty.
    pub fn new(
        author: AccountId,
        author_role: Role,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, PostError> {
        let content = check_text("content", content, POST_CONTENT_MAX_LEN)?;
        Ok(Self {
            id: PostId::new(),
            author,
            author_role,
            content,
            media: Vec::new(),
            hashtags: Vec::new(),
            visibility: Visibility::Public,
            moderation: ModerationState::Pending,
            likes: Vec::new(),
            comments: Vec::new(),
            reports: Vec::new(),
            revision: 0,
            created_at: now,
        })
    }

    pub fn status(&self) -> VerificationStatus {
        self.moderation.status()
    }

    /// Shown in the public feed.
    pub fn is_public_and_approved(&self) -> bool {
        self.visibility == Visibility::Public && self.status() == VerificationStatus::Approved
    }

    /// Undecided or rejected posts are only visible to their author and to
    /// reviewers.
    pub fn visible_to(&self, viewer: Option<(AccountId, Role)>) -> bool {
        if self.status() == VerificationStatus::Approved {
            return true;
        }
        match viewer {
            Some((id, role)) => id == self.author || role == Role::Reviewer,
            None => false,
        }
    }

    /// Like if not yet liked, otherwise unlike. Returns whether the post is
    /// now liked by `user`.
    pub fn toggle_like(&mut self, user: AccountId, role: Role, now: DateTime<Utc>) -> bool {
        if let Some(pos) = self.likes.iter().position(|l| l.user == user) {
            self.likes.remove(pos);
            false
        } else {
            self.likes.push(Like {
                user,
                role,
                created_at: now,
            });
            true
        }
    }

    pub fn add_comment(
        &mut self,
        user: AccountId,
        role: Role,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<&Comment, PostError> {
        let text = check_text("text", text, COMMENT_MAX_LEN)?;
        self.comments.push(Comment {
            id: CommentId::new(),
            user,
            role,
            text,
            created_at: now,
        });
        Ok(&self.comments[self.comments.len() - 1])
    }

    /// One report per user.
    pub fn add_report(
        &mut self,
        user: AccountId,
        reason: ReportReason,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<usize, PostError> {
        if self.reports.iter().any(|r| r.reported_by == user) {
            return Err(PostError::AlreadyReported);
        }
        self.reports.push(Report {
            reported_by: user,
            reason,
            description: description.filter(|d| !d.trim().is_empty()),
            created_at: now,
        });
        Ok(self.reports.len())
    }
}

/// Normalise hashtags: strip a leading `#`, trim, drop empties and
/// duplicates.
pub fn normalize_hashtags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().trim_start_matches('#').trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        Post::new(AccountId::new(), Role::User, "  hello world  ", Utc::now()).unwrap()
    }

    #[test]
    fn test_new_post_is_pending_and_trimmed() {
        let p = post();
        assert_eq!(p.content, "hello world");
        assert_eq!(p.status(), VerificationStatus::Pending);
        assert!(!p.moderation.is_verified());
        assert_eq!(p.visibility, Visibility::Public);
    }

    #[test]
    fn test_content_limits() {
        let author = AccountId::new();
        assert_eq!(
            Post::new(author, Role::User, "   ", Utc::now()).unwrap_err(),
            PostError::Invalid(ValidationError::Empty { field: "content" })
        );
        let long = "é".repeat(POST_CONTENT_MAX_LEN + 1);
        assert!(matches!(
            Post::new(author, Role::User, &long, Utc::now()),
            Err(PostError::Invalid(ValidationError::TooLong { .. }))
        ));
        let exact = "é".repeat(POST_CONTENT_MAX_LEN);
        assert!(Post::new(author, Role::User, &exact, Utc::now()).is_ok());
    }

    #[test]
    fn test_toggle_like() {
        let mut p = post();
        let user = AccountId::new();
        assert!(p.toggle_like(user, Role::User, Utc::now()));
        assert_eq!(p.likes.len(), 1);
        assert!(!p.toggle_like(user, Role::User, Utc::now()));
        assert!(p.likes.is_empty());
    }

    #[test]
    fn test_comment_length() {
        let mut p = post();
        let user = AccountId::new();
        assert!(p.add_comment(user, Role::Reviewer, "nice", Utc::now()).is_ok());
        assert!(p
            .add_comment(user, Role::User, &"x".repeat(COMMENT_MAX_LEN + 1), Utc::now())
            .is_err());
        assert_eq!(p.comments.len(), 1);
        assert_eq!(p.comments[0].role, Role::Reviewer);
    }

    #[test]
    fn test_one_report_per_user() {
        let mut p = post();
        let user = AccountId::new();
        assert_eq!(
            p.add_report(user, ReportReason::Spam, None, Utc::now()),
            Ok(1)
        );
        assert_eq!(
            p.add_report(user, ReportReason::Other, None, Utc::now()),
            Err(PostError::AlreadyReported)
        );
        assert_eq!(
            p.add_report(AccountId::new(), ReportReason::FalseInfo, Some("x".into()), Utc::now()),
            Ok(2)
        );
    }

    #[test]
    fn test_visibility_of_pending_post() {
        let p = post();
        assert!(!p.visible_to(None));
        assert!(!p.visible_to(Some((AccountId::new(), Role::User))));
        assert!(p.visible_to(Some((AccountId::new(), Role::Reviewer))));
        assert!(p.visible_to(Some((p.author, Role::User))));
    }

    #[test]
    fn test_report_reason_wire_names() {
        assert_eq!("false-info".parse::<ReportReason>().unwrap(), ReportReason::FalseInfo);
        assert_eq!(
            serde_json::to_string(&ReportReason::FalseInfo).unwrap(),
            "\"false-info\""
        );
        assert!("abuse".parse::<ReportReason>().is_err());
    }

    #[test]
    fn test_normalize_hashtags() {
        assert_eq!(
            normalize_hashtags(["#rust", "rust", " news ", "", "#"]),
            vec!["rust".to_string(), "news".to_string()]
        );
    }
}
