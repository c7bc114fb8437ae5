//! Follows, notifications and direct messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, MessageId, NotificationId, PostId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub follower: AccountId,
    pub following: AccountId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Mention,
    Review,
    Message,
    PostApproved,
    PostRejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: AccountId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_account: Option<AccountId>,
    pub related_post: Option<PostId>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: AccountId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient,
            kind,
            title: title.into(),
            message: message.into(),
            related_account: None,
            related_post: None,
            is_read: false,
            read_at: None,
            created_at: now,
        }
    }

    pub fn with_account(mut self, account: AccountId) -> Self {
        self.related_account = Some(account);
        self
    }

    pub fn with_post(mut self, post: PostId) -> Self {
        self.related_post = Some(post);
        self
    }

    /// Returns false if it was already read.
    pub fn mark_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(now);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: String,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub body: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: AccountId, receiver: AccountId, body: String, now: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id: conversation_id(&sender, &receiver),
            sender,
            receiver,
            body,
            is_read: false,
            read_at: None,
            created_at: now,
        }
    }
}

/// Both directions of a conversation share one id: the two account ids in
/// sorted order joined by `_`.
pub fn conversation_id(a: &AccountId, b: &AccountId) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}_{}", low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_is_symmetric() {
        let a = AccountId::new();
        let b = AccountId::new();
        assert_eq!(conversation_id(&a, &b), conversation_id(&b, &a));
        assert_ne!(conversation_id(&a, &b), conversation_id(&a, &a));
    }

    #[test]
    fn test_mark_read_once() {
        let now = Utc::now();
        let mut n = Notification::new(AccountId::new(), NotificationKind::Follow, "t", "m", now);
        assert!(n.mark_read(now));
        assert!(!n.mark_read(now));
        assert_eq!(n.read_at, Some(now));
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::PostApproved).unwrap(),
            "\"post_approved\""
        );
    }
}
