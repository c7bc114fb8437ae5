//! Ephemeral stories.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, StoryId};
use crate::media::MediaKind;
use crate::role::Role;

/// How long a story stays visible.
pub const STORY_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryView {
    pub user: AccountId,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub author: AccountId,
    pub author_role: Role,
    pub media_url: String,
    pub media_kind: MediaKind,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub views: Vec<StoryView>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub revision: u64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Story {
    pub fn new(
        author: AccountId,
        author_role: Role,
        media_url: String,
        media_kind: MediaKind,
        caption: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StoryId::new(),
            author,
            author_role,
            media_url,
            media_kind,
            caption,
            views: Vec::new(),
            view_count: 0,
            revision: 0,
            expires_at: now + Duration::hours(STORY_TTL_HOURS),
            created_at: now,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn has_viewed(&self, user: &AccountId) -> bool {
        self.views.iter().any(|v| &v.user == user)
    }

    /// Count a view once per user. Returns true if this view was new.
    pub fn record_view(&mut self, user: AccountId, now: DateTime<Utc>) -> bool {
        if self.has_viewed(&user) {
            return false;
        }
        self.views.push(StoryView {
            user,
            viewed_at: now,
        });
        self.view_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(now: DateTime<Utc>) -> Story {
        Story::new(
            AccountId::new(),
            Role::User,
            "/uploads/users/x/stories/story-1.png".into(),
            MediaKind::Image,
            String::new(),
            now,
        )
    }

    #[test]
    fn test_expires_after_a_day() {
        let now = Utc::now();
        let s = story(now);
        assert_eq!(s.expires_at - s.created_at, Duration::hours(24));
        assert!(s.is_active(now));
        assert!(s.is_active(now + Duration::hours(23)));
        assert!(!s.is_active(now + Duration::hours(24)));
    }

    #[test]
    fn test_views_count_once_per_user() {
        let now = Utc::now();
        let mut s = story(now);
        let viewer = AccountId::new();
        assert!(s.record_view(viewer, now));
        assert!(!s.record_view(viewer, now));
        assert!(s.record_view(AccountId::new(), now));
        assert_eq!(s.view_count, 2);
        assert!(s.has_viewed(&viewer));
    }
}
