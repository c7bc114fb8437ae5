//! Storage abstraction.
//!
//! The `Repository` trait covers every collection the API touches. Handlers
//! only ever see `Arc<dyn Repository>`, so the SQLite and in-memory backends
//! are interchangeable.
//!
//! # Concurrency
//!
//! Accounts, posts, stories and products carry a `revision`. `update_*` only
//! succeeds when the stored revision equals the one on the value passed in;
//! the stored revision is then bumped. A mismatch is a
//! [`RepositoryError::Conflict`]. Use [`modify`] for read-modify-write cycles,
//! it retries on conflict.

mod memory;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use verity_core::{
    Account, AccountId, Connection, Message, Notification, NotificationId, Page, Post, PostId,
    Product, ProductId, ProductQuery, Review, Story, StoryId,
};

/// Attempts made by [`modify`] before giving up on a contended record.
pub const MAX_MODIFY_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    #[error("corrupt {0} in storage")]
    Corruption(&'static str),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} {id} was modified concurrently")]
    Conflict { kind: &'static str, id: String },

    #[error("duplicate {0}")]
    Duplicate(&'static str),
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        RepositoryError::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: &'static str) -> Self {
        RepositoryError::Corruption(what)
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn conflict(kind: &'static str, id: impl ToString) -> Self {
        RepositoryError::Conflict {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict { .. })
    }
}

/// Record counts reported by the status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCounts {
    pub users: u64,
    pub reviewers: u64,
    pub businesses: u64,
    pub pending_posts: u64,
    pub approved_posts: u64,
    pub rejected_posts: u64,
    pub active_stories: u64,
    pub active_products: u64,
}

/// Every list method returns records newest first (`created_at` descending,
/// ties broken by id descending) unless documented otherwise.
#[async_trait]
pub trait Repository: Send + Sync {
    // Accounts

    /// Fails with `Duplicate("email")` if the email is taken.
    async fn insert_account(&self, account: &Account) -> Result<(), RepositoryError>;
    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError>;
    /// `email` must already be normalised.
    async fn find_account_by_email(&self, email: &str)
        -> Result<Option<Account>, RepositoryError>;
    /// Returns the stored value with its new revision.
    async fn update_account(&self, account: &Account) -> Result<Account, RepositoryError>;
    async fn delete_account(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError>;
    /// Missing ids are skipped.
    async fn get_accounts(&self, ids: &[AccountId]) -> Result<Vec<Account>, RepositoryError>;

    // Posts

    async fn insert_post(&self, post: &Post) -> Result<(), RepositoryError>;
    async fn get_post(&self, id: &PostId) -> Result<Option<Post>, RepositoryError>;
    async fn update_post(&self, post: &Post) -> Result<Post, RepositoryError>;
    async fn delete_post(&self, id: &PostId) -> Result<Option<Post>, RepositoryError>;
    /// Public approved posts for one page, plus the total across all pages.
    async fn list_feed(&self, page: Page) -> Result<(Vec<Post>, u64), RepositoryError>;
    /// Pending posts, excluding those written by `exclude_author`.
    async fn list_pending_posts(
        &self,
        exclude_author: &AccountId,
    ) -> Result<Vec<Post>, RepositoryError>;
    async fn delete_posts_by_author(&self, author: &AccountId)
        -> Result<Vec<Post>, RepositoryError>;

    // Reviews

    async fn insert_review(&self, review: &Review) -> Result<(), RepositoryError>;
    async fn list_reviews_by_reviewer(
        &self,
        reviewer: &AccountId,
    ) -> Result<Vec<Review>, RepositoryError>;

    // Stories

    async fn insert_story(&self, story: &Story) -> Result<(), RepositoryError>;
    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>, RepositoryError>;
    async fn update_story(&self, story: &Story) -> Result<Story, RepositoryError>;
    async fn delete_story(&self, id: &StoryId) -> Result<Option<Story>, RepositoryError>;
    /// Stories with `expires_at > now`, optionally by one author.
    async fn list_active_stories(
        &self,
        author: Option<&AccountId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Story>, RepositoryError>;
    /// Remove stories with `expires_at <= now` and return them.
    async fn purge_expired_stories(&self, now: DateTime<Utc>)
        -> Result<Vec<Story>, RepositoryError>;
    async fn delete_stories_by_author(
        &self,
        author: &AccountId,
    ) -> Result<Vec<Story>, RepositoryError>;

    // Products

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError>;
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn update_product(&self, product: &Product) -> Result<Product, RepositoryError>;
    async fn delete_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    /// Products matching `query` for one page, plus the total match count.
    async fn list_products(
        &self,
        query: &ProductQuery,
        page: Page,
    ) -> Result<(Vec<Product>, u64), RepositoryError>;
    /// All products of one business, active or not.
    async fn list_products_by_business(
        &self,
        business: &AccountId,
    ) -> Result<Vec<Product>, RepositoryError>;
    async fn delete_products_by_business(
        &self,
        business: &AccountId,
    ) -> Result<Vec<Product>, RepositoryError>;

    // Connections

    /// Fails with `Duplicate("connection")` if the pair already exists.
    async fn insert_connection(&self, connection: &Connection) -> Result<(), RepositoryError>;
    /// Returns false if there was nothing to remove.
    async fn delete_connection(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> Result<bool, RepositoryError>;
    async fn list_followers(&self, account: &AccountId)
        -> Result<Vec<Connection>, RepositoryError>;
    async fn list_following(&self, account: &AccountId)
        -> Result<Vec<Connection>, RepositoryError>;
    /// Remove every connection in which `account` takes part.
    async fn delete_connections_of(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Connection>, RepositoryError>;

    // Notifications

    async fn insert_notification(&self, notification: &Notification)
        -> Result<(), RepositoryError>;
    async fn list_notifications(
        &self,
        recipient: &AccountId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError>;
    async fn count_unread_notifications(&self, recipient: &AccountId)
        -> Result<u64, RepositoryError>;
    /// `None` when the notification does not exist or belongs to someone else.
    async fn mark_notification_read(
        &self,
        recipient: &AccountId,
        id: &NotificationId,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, RepositoryError>;
    /// Returns how many were unread.
    async fn mark_all_notifications_read(
        &self,
        recipient: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    // Messages

    async fn insert_message(&self, message: &Message) -> Result<(), RepositoryError>;
    /// Oldest first.
    async fn list_conversation(&self, conversation_id: &str)
        -> Result<Vec<Message>, RepositoryError>;
    /// Mark messages in the conversation addressed to `receiver` as read.
    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        receiver: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    // Status

    async fn counts(&self, now: DateTime<Utc>) -> Result<StorageCounts, RepositoryError>;
}

/// A record that can be re-read and written back under revision control.
#[async_trait]
pub trait Versioned: Clone + Send + Sync + Sized + 'static {
    type Id: Send + Sync;

    async fn load(repo: &dyn Repository, id: &Self::Id) -> Result<Option<Self>, RepositoryError>;
    async fn store(repo: &dyn Repository, value: &Self) -> Result<Self, RepositoryError>;
}

#[async_trait]
impl Versioned for Account {
    type Id = AccountId;

    async fn load(repo: &dyn Repository, id: &AccountId) -> Result<Option<Self>, RepositoryError> {
        repo.get_account(id).await
    }

    async fn store(repo: &dyn Repository, value: &Self) -> Result<Self, RepositoryError> {
        repo.update_account(value).await
    }
}

#[async_trait]
impl Versioned for Post {
    type Id = PostId;

    async fn load(repo: &dyn Repository, id: &PostId) -> Result<Option<Self>, RepositoryError> {
        repo.get_post(id).await
    }

    async fn store(repo: &dyn Repository, value: &Self) -> Result<Self, RepositoryError> {
        repo.update_post(value).await
    }
}

#[async_trait]
impl Versioned for Story {
    type Id = StoryId;

    async fn load(repo: &dyn Repository, id: &StoryId) -> Result<Option<Self>, RepositoryError> {
        repo.get_story(id).await
    }

    async fn store(repo: &dyn Repository, value: &Self) -> Result<Self, RepositoryError> {
        repo.update_story(value).await
    }
}

#[async_trait]
impl Versioned for Product {
    type Id = ProductId;

    async fn load(repo: &dyn Repository, id: &ProductId) -> Result<Option<Self>, RepositoryError> {
        repo.get_product(id).await
    }

    async fn store(repo: &dyn Repository, value: &Self) -> Result<Self, RepositoryError> {
        repo.update_product(value).await
    }
}

/// Load a record, apply `apply` and write it back.
///
/// On a revision conflict the record is re-read and `apply` runs again, up to
/// [`MAX_MODIFY_ATTEMPTS`] times. If `apply` fails nothing is written. Returns
/// `Ok(None)` when the record does not exist.
pub async fn modify<D, T, E, F>(
    repo: &dyn Repository,
    id: &D::Id,
    mut apply: F,
) -> Result<Option<(D, T)>, E>
where
    D: Versioned,
    T: Send,
    E: From<RepositoryError> + Send,
    F: FnMut(&mut D) -> Result<T, E> + Send,
{
    let mut last_conflict = None;
    for attempt in 1..=MAX_MODIFY_ATTEMPTS {
        let Some(mut record) = D::load(repo, id).await? else {
            return Ok(None);
        };
        let out = apply(&mut record)?;
        match D::store(repo, &record).await {
            Ok(stored) => return Ok(Some((stored, out))),
            Err(e) if e.is_conflict() => {
                debug!("Revision conflict on attempt {}: {}", attempt, e);
                last_conflict = Some(e);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(last_conflict
        .unwrap_or_else(|| RepositoryError::storage("modify", "no attempts made"))
        .into())
}

/// Newest first: `created_at` descending, then id descending.
pub(crate) fn newest_first<T, K: Ord>(
    items: &mut [T],
    key: impl Fn(&T) -> (DateTime<Utc>, K),
) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use verity_core::Role;

    fn account() -> Account {
        Account::new("a@example.com", "hash".into(), Role::User, "Ann Lee", Utc::now())
    }

    #[tokio::test]
    async fn test_modify_missing_record() {
        let repo = InMemoryRepository::new();
        let out: Result<Option<(Account, ())>, RepositoryError> =
            modify(&repo, &AccountId::new(), |_: &mut Account| Ok(())).await;
        assert!(out.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_modify_bumps_revision() {
        let repo = InMemoryRepository::new();
        let account = account();
        repo.insert_account(&account).await.unwrap();

        let (stored, count) = modify::<Account, _, RepositoryError, _>(&repo, &account.id, |a| {
            a.social_stats.followers_count += 1;
            Ok(a.social_stats.followers_count)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(count, 1);
        assert_eq!(stored.revision, account.revision + 1);
    }

    #[tokio::test]
    async fn test_modify_failure_writes_nothing() {
        let repo = InMemoryRepository::new();
        let account = account();
        repo.insert_account(&account).await.unwrap();

        let out = modify::<Account, (), RepositoryError, _>(&repo, &account.id, |a| {
            a.social_stats.followers_count = 99;
            Err(RepositoryError::storage("test", "refused"))
        })
        .await;
        assert!(out.is_err());

        let stored = repo.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.social_stats.followers_count, 0);
        assert_eq!(stored.revision, account.revision);
    }

    #[tokio::test]
    async fn test_concurrent_modifications_are_not_lost() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let account = account();
        repo.insert_account(&account).await.unwrap();

        let attempts = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = repo.clone();
            let attempts = attempts.clone();
            let id = account.id;
            handles.push(tokio::spawn(async move {
                modify::<Account, _, RepositoryError, _>(repo.as_ref(), &id, |a| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    a.activity.login_count += 1;
                    Ok(())
                })
                .await
            }));
        }
        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        let stored = repo.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.activity.login_count, succeeded);
        assert!(attempts.load(Ordering::SeqCst) >= succeeded as usize);
    }
}
