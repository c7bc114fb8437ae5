//! In-memory implementation of `Repository`.
//!
//! All data is held in `HashMap`s behind `RwLock`s and lost on restart. Used
//! by the test suite and by `STORAGE_BACKEND=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{newest_first, Repository, RepositoryError, StorageCounts};
use verity_core::{
    Account, AccountId, Connection, Message, Notification, NotificationId, Page, Post, PostId,
    Product, ProductId, ProductQuery, Review, ReviewId, Role, Story, StoryId, VerificationStatus,
};

#[derive(Default)]
pub struct InMemoryRepository {
    accounts: RwLock<HashMap<AccountId, Account>>,
    posts: RwLock<HashMap<PostId, Post>>,
    reviews: RwLock<HashMap<ReviewId, Review>>,
    stories: RwLock<HashMap<StoryId, Story>>,
    products: RwLock<HashMap<ProductId, Product>>,
    connections: RwLock<Vec<Connection>>,
    notifications: RwLock<HashMap<NotificationId, Notification>>,
    messages: RwLock<Vec<Message>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compare-and-swap on the revision counter.
fn swap_revisioned<K, V>(
    map: &mut HashMap<K, V>,
    kind: &'static str,
    id: K,
    value: &V,
    revision: impl Fn(&mut V) -> &mut u64,
) -> Result<V, RepositoryError>
where
    K: std::hash::Hash + Eq + std::fmt::Display,
    V: Clone,
{
    let Some(current) = map.get_mut(&id) else {
        return Err(RepositoryError::not_found(kind, id));
    };
    let mut next = value.clone();
    let expected = *revision(&mut next);
    if *revision(current) != expected {
        return Err(RepositoryError::conflict(kind, id));
    }
    *revision(&mut next) = expected + 1;
    *current = next.clone();
    Ok(next)
}

fn drain_where<K, V>(map: &mut HashMap<K, V>, pred: impl Fn(&V) -> bool) -> Vec<V>
where
    K: std::hash::Hash + Eq + Clone,
{
    let keys: Vec<K> = map
        .iter()
        .filter(|(_, v)| pred(v))
        .map(|(k, _)| k.clone())
        .collect();
    keys.into_iter().filter_map(|k| map.remove(&k)).collect()
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert_account(&self, account: &Account) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == account.email) {
            return Err(RepositoryError::Duplicate("email"));
        }
        if accounts.contains_key(&account.id) {
            return Err(RepositoryError::Duplicate("account id"));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn update_account(&self, account: &Account) -> Result<Account, RepositoryError> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .values()
            .any(|a| a.email == account.email && a.id != account.id)
        {
            return Err(RepositoryError::Duplicate("email"));
        }
        swap_revisioned(&mut accounts, "account", account.id, account, |a| {
            &mut a.revision
        })
    }

    async fn delete_account(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.write().await.remove(id))
    }

    async fn get_accounts(&self, ids: &[AccountId]) -> Result<Vec<Account>, RepositoryError> {
        let accounts = self.accounts.read().await;
        Ok(ids.iter().filter_map(|id| accounts.get(id).cloned()).collect())
    }

    async fn insert_post(&self, post: &Post) -> Result<(), RepositoryError> {
        let mut posts = self.posts.write().await;
        if posts.contains_key(&post.id) {
            return Err(RepositoryError::Duplicate("post id"));
        }
        posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn get_post(&self, id: &PostId) -> Result<Option<Post>, RepositoryError> {
        Ok(self.posts.read().await.get(id).cloned())
    }

    async fn update_post(&self, post: &Post) -> Result<Post, RepositoryError> {
        let mut posts = self.posts.write().await;
        swap_revisioned(&mut posts, "post", post.id, post, |p| &mut p.revision)
    }

    async fn delete_post(&self, id: &PostId) -> Result<Option<Post>, RepositoryError> {
        Ok(self.posts.write().await.remove(id))
    }

    async fn list_feed(&self, page: Page) -> Result<(Vec<Post>, u64), RepositoryError> {
        let mut feed: Vec<Post> = self
            .posts
            .read()
            .await
            .values()
            .filter(|p| p.is_public_and_approved())
            .cloned()
            .collect();
        newest_first(&mut feed, |p| (p.created_at, p.id));
        let total = feed.len() as u64;
        Ok((page.slice(feed), total))
    }

    async fn list_pending_posts(
        &self,
        exclude_author: &AccountId,
    ) -> Result<Vec<Post>, RepositoryError> {
        let mut pending: Vec<Post> = self
            .posts
            .read()
            .await
            .values()
            .filter(|p| p.status() == VerificationStatus::Pending && &p.author != exclude_author)
            .cloned()
            .collect();
        newest_first(&mut pending, |p| (p.created_at, p.id));
        Ok(pending)
    }

    async fn delete_posts_by_author(
        &self,
        author: &AccountId,
    ) -> Result<Vec<Post>, RepositoryError> {
        let mut posts = self.posts.write().await;
        Ok(drain_where(&mut posts, |p| &p.author == author))
    }

    async fn insert_review(&self, review: &Review) -> Result<(), RepositoryError> {
        let mut reviews = self.reviews.write().await;
        if reviews.contains_key(&review.id) {
            return Err(RepositoryError::Duplicate("review id"));
        }
        reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn list_reviews_by_reviewer(
        &self,
        reviewer: &AccountId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let mut reviews: Vec<Review> = self
            .reviews
            .read()
            .await
            .values()
            .filter(|r| &r.reviewer == reviewer)
            .cloned()
            .collect();
        newest_first(&mut reviews, |r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn insert_story(&self, story: &Story) -> Result<(), RepositoryError> {
        let mut stories = self.stories.write().await;
        if stories.contains_key(&story.id) {
            return Err(RepositoryError::Duplicate("story id"));
        }
        stories.insert(story.id, story.clone());
        Ok(())
    }

    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>, RepositoryError> {
        Ok(self.stories.read().await.get(id).cloned())
    }

    async fn update_story(&self, story: &Story) -> Result<Story, RepositoryError> {
        let mut stories = self.stories.write().await;
        swap_revisioned(&mut stories, "story", story.id, story, |s| &mut s.revision)
    }

    async fn delete_story(&self, id: &StoryId) -> Result<Option<Story>, RepositoryError> {
        Ok(self.stories.write().await.remove(id))
    }

    async fn list_active_stories(
        &self,
        author: Option<&AccountId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Story>, RepositoryError> {
        let mut active: Vec<Story> = self
            .stories
            .read()
            .await
            .values()
            .filter(|s| s.is_active(now) && author.map_or(true, |a| &s.author == a))
            .cloned()
            .collect();
        newest_first(&mut active, |s| (s.created_at, s.id));
        Ok(active)
    }

    async fn purge_expired_stories(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Story>, RepositoryError> {
        let mut stories = self.stories.write().await;
        Ok(drain_where(&mut stories, |s| !s.is_active(now)))
    }

    async fn delete_stories_by_author(
        &self,
        author: &AccountId,
    ) -> Result<Vec<Story>, RepositoryError> {
        let mut stories = self.stories.write().await;
        Ok(drain_where(&mut stories, |s| &s.author == author))
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(RepositoryError::Duplicate("product id"));
        }
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn update_product(&self, product: &Product) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        swap_revisioned(&mut products, "product", product.id, product, |p| {
            &mut p.revision
        })
    }

    async fn delete_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.write().await.remove(id))
    }

    async fn list_products(
        &self,
        query: &ProductQuery,
        page: Page,
    ) -> Result<(Vec<Product>, u64), RepositoryError> {
        let mut matching: Vec<Product> = self
            .products
            .read()
            .await
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        newest_first(&mut matching, |p| (p.created_at, p.id));
        let total = matching.len() as u64;
        Ok((page.slice(matching), total))
    }

    async fn list_products_by_business(
        &self,
        business: &AccountId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut owned: Vec<Product> = self
            .products
            .read()
            .await
            .values()
            .filter(|p| &p.business == business)
            .cloned()
            .collect();
        newest_first(&mut owned, |p| (p.created_at, p.id));
        Ok(owned)
    }

    async fn delete_products_by_business(
        &self,
        business: &AccountId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut products = self.products.write().await;
        Ok(drain_where(&mut products, |p| &p.business == business))
    }

    async fn insert_connection(&self, connection: &Connection) -> Result<(), RepositoryError> {
        let mut connections = self.connections.write().await;
        if connections
            .iter()
            .any(|c| c.follower == connection.follower && c.following == connection.following)
        {
            return Err(RepositoryError::Duplicate("connection"));
        }
        connections.push(connection.clone());
        Ok(())
    }

    async fn delete_connection(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> Result<bool, RepositoryError> {
        let mut connections = self.connections.write().await;
        let before = connections.len();
        connections.retain(|c| !(&c.follower == follower && &c.following == following));
        Ok(connections.len() != before)
    }

    async fn list_followers(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Connection>, RepositoryError> {
        let mut followers: Vec<Connection> = self
            .connections
            .read()
            .await
            .iter()
            .filter(|c| &c.following == account)
            .cloned()
            .collect();
        newest_first(&mut followers, |c| (c.created_at, c.follower));
        Ok(followers)
    }

    async fn list_following(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Connection>, RepositoryError> {
        let mut following: Vec<Connection> = self
            .connections
            .read()
            .await
            .iter()
            .filter(|c| &c.follower == account)
            .cloned()
            .collect();
        newest_first(&mut following, |c| (c.created_at, c.following));
        Ok(following)
    }

    async fn delete_connections_of(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Connection>, RepositoryError> {
        let mut connections = self.connections.write().await;
        let (removed, kept): (Vec<Connection>, Vec<Connection>) = connections
            .drain(..)
            .partition(|c| &c.follower == account || &c.following == account);
        *connections = kept;
        Ok(removed)
    }

    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<(), RepositoryError> {
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        recipient: &AccountId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let mut list: Vec<Notification> = self
            .notifications
            .read()
            .await
            .values()
            .filter(|n| &n.recipient == recipient && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        newest_first(&mut list, |n| (n.created_at, n.id));
        Ok(list)
    }

    async fn count_unread_notifications(
        &self,
        recipient: &AccountId,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .notifications
            .read()
            .await
            .values()
            .filter(|n| &n.recipient == recipient && !n.is_read)
            .count() as u64)
    }

    async fn mark_notification_read(
        &self,
        recipient: &AccountId,
        id: &NotificationId,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, RepositoryError> {
        let mut notifications = self.notifications.write().await;
        match notifications.get_mut(id) {
            Some(n) if &n.recipient == recipient => {
                n.mark_read(now);
                Ok(Some(n.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_all_notifications_read(
        &self,
        recipient: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut notifications = self.notifications.write().await;
        Ok(notifications
            .values_mut()
            .filter(|n| &n.recipient == recipient)
            .map(|n| n.mark_read(now))
            .filter(|changed| *changed)
            .count() as u64)
    }

    async fn insert_message(&self, message: &Message) -> Result<(), RepositoryError> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn list_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut conversation: Vec<Message> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        conversation.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(conversation)
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        receiver: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut messages = self.messages.write().await;
        let mut updated = 0;
        for m in messages
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id && &m.receiver == receiver && !m.is_read)
        {
            m.is_read = true;
            m.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }

    async fn counts(&self, now: DateTime<Utc>) -> Result<StorageCounts, RepositoryError> {
        let mut counts = StorageCounts::default();
        for account in self.accounts.read().await.values() {
            match account.role {
                Role::User => counts.users += 1,
                Role::Reviewer => counts.reviewers += 1,
                Role::Business => counts.businesses += 1,
            }
        }
        for post in self.posts.read().await.values() {
            match post.status() {
                VerificationStatus::Pending => counts.pending_posts += 1,
                VerificationStatus::Approved => counts.approved_posts += 1,
                VerificationStatus::Rejected => counts.rejected_posts += 1,
            }
        }
        counts.active_stories = self
            .stories
            .read()
            .await
            .values()
            .filter(|s| s.is_active(now))
            .count() as u64;
        counts.active_products = self
            .products
            .read()
            .await
            .values()
            .filter(|p| p.is_active)
            .count() as u64;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use verity_core::{MediaKind, ModerationState};

    fn post_at(author: AccountId, at: DateTime<Utc>) -> Post {
        Post::new(author, Role::User, "content", at).unwrap()
    }

    fn approve(post: &mut Post) {
        post.moderation = ModerationState::Approved {
            reviewed_by: AccountId::new(),
            reviewed_at: Utc::now(),
            notes: None,
        };
    }

    #[tokio::test]
    async fn test_duplicate_email_is_refused() {
        let repo = InMemoryRepository::new();
        let a = Account::new("x@example.com", "h".into(), Role::User, "X", Utc::now());
        let b = Account::new("x@example.com", "h".into(), Role::Business, "Y", Utc::now());
        repo.insert_account(&a).await.unwrap();
        assert!(matches!(
            repo.insert_account(&b).await,
            Err(RepositoryError::Duplicate("email"))
        ));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let repo = InMemoryRepository::new();
        let post = post_at(AccountId::new(), Utc::now());
        repo.insert_post(&post).await.unwrap();

        let first = repo.update_post(&post).await.unwrap();
        assert_eq!(first.revision, 1);
        let err = repo.update_post(&post).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = InMemoryRepository::new();
        let post = post_at(AccountId::new(), Utc::now());
        assert!(matches!(
            repo.update_post(&post).await,
            Err(RepositoryError::NotFound { kind: "post", .. })
        ));
    }

    #[tokio::test]
    async fn test_feed_is_public_approved_newest_first() {
        let repo = InMemoryRepository::new();
        let author = AccountId::new();
        let base = Utc::now();

        let mut old = post_at(author, base - Duration::minutes(2));
        approve(&mut old);
        let mut new = post_at(author, base);
        approve(&mut new);
        let pending = post_at(author, base - Duration::minutes(1));
        let mut private = post_at(author, base);
        approve(&mut private);
        private.visibility = verity_core::Visibility::Private;

        for p in [&old, &new, &pending, &private] {
            repo.insert_post(p).await.unwrap();
        }

        let (page, total) = repo.list_feed(Page::new(None, None, 10)).await.unwrap();
        assert_eq!(total, 2);
        let ids: Vec<_> = page.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn test_purge_only_removes_expired() {
        let repo = InMemoryRepository::new();
        let now = Utc::now();
        let fresh = Story::new(
            AccountId::new(),
            Role::User,
            "/a".into(),
            MediaKind::Image,
            String::new(),
            now,
        );
        let stale = Story::new(
            AccountId::new(),
            Role::User,
            "/b".into(),
            MediaKind::Video,
            String::new(),
            now - Duration::hours(25),
        );
        repo.insert_story(&fresh).await.unwrap();
        repo.insert_story(&stale).await.unwrap();

        let purged = repo.purge_expired_stories(now).await.unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id, stale.id);
        assert_eq!(repo.list_active_stories(None, now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_read_scoped_to_recipient() {
        let repo = InMemoryRepository::new();
        let recipient = AccountId::new();
        let n = Notification::new(
            recipient,
            verity_core::NotificationKind::Like,
            "t",
            "m",
            Utc::now(),
        );
        repo.insert_notification(&n).await.unwrap();

        assert!(repo
            .mark_notification_read(&AccountId::new(), &n.id, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.count_unread_notifications(&recipient).await.unwrap(), 1);
        assert_eq!(
            repo.mark_all_notifications_read(&recipient, Utc::now())
                .await
                .unwrap(),
            1
        );
        assert_eq!(repo.count_unread_notifications(&recipient).await.unwrap(), 0);
    }
}
