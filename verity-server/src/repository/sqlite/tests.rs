//! Tests for SQLite repository implementation.

use chrono::{Duration, Utc};
use rusqlite::params;

use super::{SqliteRepository, CURRENT_SCHEMA_VERSION};
use crate::repository::{modify, InMemoryRepository, Repository, RepositoryError};
use verity_core::{
    conversation_id, Account, AccountId, Connection, MediaKind, Message, ModerationState,
    NewProduct, Notification, NotificationKind, Page, Post, Product, ProductCategory,
    ProductQuery, Review, ReviewId, Role, Story, Verdict, Visibility,
};

use proptest::prelude::*;

fn account(email: &str, role: Role) -> Account {
    Account::new(email, "hash".into(), role, "Test Person", Utc::now())
}

fn approved(author: AccountId, at: chrono::DateTime<Utc>) -> Post {
    let mut post = Post::new(author, Role::User, "checked content", at).unwrap();
    post.moderation = ModerationState::Approved {
        reviewed_by: AccountId::new(),
        reviewed_at: at,
        notes: None,
    };
    post
}

fn product(business: AccountId, name: &str, category: ProductCategory) -> Product {
    Product::new(
        business,
        NewProduct {
            name: name.into(),
            description: "Handmade".into(),
            price: 12.0,
            category,
            tags: vec!["gift".into()],
            stock: 2,
        },
        Utc::now(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_schema_version_is_recorded() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let conn = repo.conn.lock().unwrap();
    let version: i64 = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verity.db");
    {
        let repo = SqliteRepository::new(&path).unwrap();
        let conn = repo.conn.lock().unwrap();
        conn.execute(
            "UPDATE schema_version SET version = ?1 WHERE id = 1",
            params![CURRENT_SCHEMA_VERSION + 1],
        )
        .unwrap();
    }
    assert!(SqliteRepository::new(&path).is_err());
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("verity.db");
    let account = account("keep@example.com", Role::Business);
    {
        let repo = SqliteRepository::new(&path).unwrap();
        repo.insert_account(&account).await.unwrap();
    }
    let repo = SqliteRepository::new(&path).unwrap();
    let found = repo
        .find_account_by_email("keep@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, account);
}

#[tokio::test]
async fn test_duplicate_email_is_refused() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    repo.insert_account(&account("dup@example.com", Role::User))
        .await
        .unwrap();
    let err = repo
        .insert_account(&account("dup@example.com", Role::Reviewer))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Duplicate("email")));
}

#[tokio::test]
async fn test_update_checks_revision() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let mut account = account("rev@example.com", Role::User);
    repo.insert_account(&account).await.unwrap();

    account.profile_info.bio = "hello".into();
    let stored = repo.update_account(&account).await.unwrap();
    assert_eq!(stored.revision, 1);
    assert_eq!(
        repo.get_account(&account.id).await.unwrap().unwrap().profile_info.bio,
        "hello"
    );

    let err = repo.update_account(&account).await.unwrap_err();
    assert!(err.is_conflict());

    let ghost = self::account("ghost@example.com", Role::User);
    let err = repo.update_account(&ghost).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { kind: "account", .. }));
}

#[tokio::test]
async fn test_modify_through_sqlite() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let post = Post::new(AccountId::new(), Role::User, "x", Utc::now()).unwrap();
    repo.insert_post(&post).await.unwrap();

    let liker = AccountId::new();
    let (stored, liked) = modify::<Post, _, RepositoryError, _>(&repo, &post.id, |p| {
        Ok(p.toggle_like(liker, Role::User, Utc::now()))
    })
    .await
    .unwrap()
    .unwrap();
    assert!(liked);
    assert_eq!(stored.likes.len(), 1);
    assert_eq!(stored.revision, 1);
}

#[tokio::test]
async fn test_status_column_follows_moderation() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let mut post = Post::new(AccountId::new(), Role::User, "x", Utc::now()).unwrap();
    repo.insert_post(&post).await.unwrap();
    assert_eq!(repo.counts(Utc::now()).await.unwrap().pending_posts, 1);

    post.moderation = ModerationState::Rejected {
        reviewed_by: AccountId::new(),
        reviewed_at: Utc::now(),
        notes: None,
        verdict: Verdict::False,
    };
    repo.update_post(&post).await.unwrap();

    let counts = repo.counts(Utc::now()).await.unwrap();
    assert_eq!(counts.pending_posts, 0);
    assert_eq!(counts.rejected_posts, 1);
}

#[tokio::test]
async fn test_feed_paging() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let author = AccountId::new();
    let base = Utc::now();
    let mut ids = Vec::new();
    for i in 0..5 {
        let post = approved(author, base + Duration::seconds(i));
        repo.insert_post(&post).await.unwrap();
        ids.push(post.id);
    }
    let mut hidden = approved(author, base);
    hidden.visibility = Visibility::Connections;
    repo.insert_post(&hidden).await.unwrap();

    let (first, total) = repo.list_feed(Page::new(Some(1), Some(2), 10)).await.unwrap();
    assert_eq!(total, 5);
    assert_eq!(
        first.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![ids[4], ids[3]]
    );
    let (last, _) = repo.list_feed(Page::new(Some(3), Some(2), 10)).await.unwrap();
    assert_eq!(last.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ids[0]]);
}

#[tokio::test]
async fn test_pending_excludes_own_posts() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let reviewer = AccountId::new();
    let own = Post::new(reviewer, Role::Reviewer, "mine", Utc::now()).unwrap();
    let other = Post::new(AccountId::new(), Role::User, "theirs", Utc::now()).unwrap();
    repo.insert_post(&own).await.unwrap();
    repo.insert_post(&other).await.unwrap();

    let pending = repo.list_pending_posts(&reviewer).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, other.id);
}

#[tokio::test]
async fn test_reviews_by_reviewer() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let reviewer = AccountId::new();
    let review = Review {
        id: ReviewId::new(),
        post: verity_core::PostId::new(),
        reviewer,
        verdict: Verdict::Misleading,
        notes: Some("cropped photo".into()),
        confidence: 70,
        sources: vec![],
        tags: vec![],
        created_at: Utc::now(),
    };
    repo.insert_review(&review).await.unwrap();
    assert_eq!(
        repo.list_reviews_by_reviewer(&reviewer).await.unwrap(),
        vec![review]
    );
    assert!(repo
        .list_reviews_by_reviewer(&AccountId::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_story_expiry() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let now = Utc::now();
    let author = AccountId::new();
    let live = Story::new(author, Role::User, "/l".into(), MediaKind::Image, "".into(), now);
    let dead = Story::new(
        author,
        Role::User,
        "/d".into(),
        MediaKind::Image,
        "".into(),
        now - Duration::hours(30),
    );
    repo.insert_story(&live).await.unwrap();
    repo.insert_story(&dead).await.unwrap();

    let active = repo.list_active_stories(Some(&author), now).await.unwrap();
    assert_eq!(active.iter().map(|s| s.id).collect::<Vec<_>>(), vec![live.id]);

    let purged = repo.purge_expired_stories(now).await.unwrap();
    assert_eq!(purged.iter().map(|s| s.id).collect::<Vec<_>>(), vec![dead.id]);
    assert!(repo.get_story(&dead.id).await.unwrap().is_none());
    assert_eq!(repo.counts(now).await.unwrap().active_stories, 1);
}

#[tokio::test]
async fn test_product_listing_filters() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let business = AccountId::new();
    let lamp = product(business, "Desk Lamp", ProductCategory::Home);
    let phone = product(business, "Phone", ProductCategory::Electronics);
    let mut hidden = product(business, "Old Lamp", ProductCategory::Home);
    hidden.is_active = false;
    for p in [&lamp, &phone, &hidden] {
        repo.insert_product(p).await.unwrap();
    }

    let page = Page::new(None, None, 12);
    let (all, total) = repo.list_products(&ProductQuery::default(), page).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(all.len(), 2);

    let home = ProductQuery::parse(Some("Home & Furniture"), None).unwrap();
    let (found, _) = repo.list_products(&home, page).await.unwrap();
    assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![lamp.id]);

    let search = ProductQuery::parse(None, Some("lamp")).unwrap();
    let (found, total) = repo.list_products(&search, page).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(found[0].id, lamp.id);

    assert_eq!(repo.list_products_by_business(&business).await.unwrap().len(), 3);
    assert_eq!(repo.delete_products_by_business(&business).await.unwrap().len(), 3);
    assert!(repo.get_product(&lamp.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_connections() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let (a, b, c) = (AccountId::new(), AccountId::new(), AccountId::new());
    let follow = |follower, following| Connection {
        follower,
        following,
        created_at: Utc::now(),
    };
    repo.insert_connection(&follow(a, b)).await.unwrap();
    repo.insert_connection(&follow(c, b)).await.unwrap();
    assert!(matches!(
        repo.insert_connection(&follow(a, b)).await,
        Err(RepositoryError::Duplicate("connection"))
    ));

    assert_eq!(repo.list_followers(&b).await.unwrap().len(), 2);
    assert_eq!(repo.list_following(&a).await.unwrap().len(), 1);
    assert!(repo.delete_connection(&a, &b).await.unwrap());
    assert!(!repo.delete_connection(&a, &b).await.unwrap());

    let removed = repo.delete_connections_of(&b).await.unwrap();
    assert_eq!(removed.len(), 1);
    assert!(repo.list_following(&c).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_notifications_and_messages() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let (me, you) = (AccountId::new(), AccountId::new());
    let now = Utc::now();

    let n1 = Notification::new(me, NotificationKind::Follow, "New follower", "x", now);
    let n2 = Notification::new(me, NotificationKind::Like, "New like", "y", now);
    repo.insert_notification(&n1).await.unwrap();
    repo.insert_notification(&n2).await.unwrap();

    assert!(repo
        .mark_notification_read(&you, &n1.id, now)
        .await
        .unwrap()
        .is_none());
    let read = repo
        .mark_notification_read(&me, &n1.id, now)
        .await
        .unwrap()
        .unwrap();
    assert!(read.is_read);
    assert_eq!(repo.list_notifications(&me, true).await.unwrap().len(), 1);
    assert_eq!(repo.mark_all_notifications_read(&me, now).await.unwrap(), 1);
    assert_eq!(repo.count_unread_notifications(&me).await.unwrap(), 0);

    let first = Message::new(me, you, "hi".into(), now);
    let second = Message::new(you, me, "hello".into(), now + Duration::seconds(1));
    repo.insert_message(&first).await.unwrap();
    repo.insert_message(&second).await.unwrap();

    let convo = conversation_id(&me, &you);
    let messages = repo.list_conversation(&convo).await.unwrap();
    assert_eq!(
        messages.iter().map(|m| m.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );
    assert_eq!(repo.mark_conversation_read(&convo, &me, now).await.unwrap(), 1);
    assert_eq!(repo.mark_conversation_read(&convo, &me, now).await.unwrap(), 0);
}

proptest! {
    /// Property: both backends produce the same feed order and totals.
    #[test]
    fn feed_matches_in_memory(
        offsets in proptest::collection::vec((0i64..50, any::<bool>()), 0..20),
        page in 1u32..4,
        limit in 1u32..6,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let sqlite = SqliteRepository::new_in_memory().unwrap();
            let memory = InMemoryRepository::new();
            let base = Utc::now();
            for (offset, is_approved) in &offsets {
                let at = base + Duration::seconds(*offset);
                let post = if *is_approved {
                    approved(AccountId::new(), at)
                } else {
                    Post::new(AccountId::new(), Role::User, "p", at).unwrap()
                };
                sqlite.insert_post(&post).await.unwrap();
                memory.insert_post(&post).await.unwrap();
            }
            let page = Page::new(Some(page), Some(limit), 10);
            let (a, ta) = sqlite.list_feed(page).await.unwrap();
            let (b, tb) = memory.list_feed(page).await.unwrap();
            assert_eq!(ta, tb);
            assert_eq!(
                a.iter().map(|p| p.id).collect::<Vec<_>>(),
                b.iter().map(|p| p.id).collect::<Vec<_>>()
            );
        });
    }
}
