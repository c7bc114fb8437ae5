//! SQLite implementation of `Repository`.
//!
//! Every table stores the full record as JSON in a `doc` column, next to the
//! columns that queries filter or sort on. Those columns are rewritten from
//! the record on every update so they cannot drift from the document.
//!
//! # Schema Versioning
//!
//! The `schema_version` table tracks the schema version. To change the schema,
//! increment `CURRENT_SCHEMA_VERSION` and add a step in `run_migrations()`.
//! New record fields should be `#[serde(default)]` so older documents still
//! deserialize.

mod accounts;
mod posts;
mod products;
mod social;
mod stories;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Params};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::{Repository, RepositoryError, StorageCounts};
use verity_core::{
    Account, AccountId, Connection as Follow, Message, Notification, NotificationId, Page, Post,
    PostId, Product, ProductId, ProductQuery, Review, Story, StoryId,
};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed repository.
///
/// rusqlite is synchronous, so every call runs on the blocking pool via
/// `tokio::task::spawn_blocking` and takes the connection mutex there.
pub struct SqliteRepository {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and bring its schema up to date.
    ///
    /// The database is configured with `journal_mode = WAL`,
    /// `synchronous = FULL` and `busy_timeout = 5000ms`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        // Account documents hold password hashes.
        #[cfg(unix)]
        if !is_in_memory && !path_str.is_empty() {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path_ref, permissions) {
                warn!(
                    "Failed to set restrictive permissions on database file: {}",
                    e
                );
            }
        }

        // SQLite can silently keep DELETE mode on filesystems without shared
        // memory support, so check what we actually got.
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));

        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS accounts (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    role TEXT NOT NULL,
                    revision INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    doc TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS posts (
                    id TEXT PRIMARY KEY,
                    author_id TEXT NOT NULL,
                    visibility TEXT NOT NULL,
                    status TEXT NOT NULL,
                    revision INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    doc TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_posts_status
                    ON posts(status, created_at DESC, id DESC);
                CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);

                CREATE TABLE IF NOT EXISTS reviews (
                    id TEXT PRIMARY KEY,
                    reviewer_id TEXT NOT NULL,
                    post_id TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    doc TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_reviews_reviewer
                    ON reviews(reviewer_id, created_at DESC);

                CREATE TABLE IF NOT EXISTS stories (
                    id TEXT PRIMARY KEY,
                    author_id TEXT NOT NULL,
                    expires_at INTEGER NOT NULL,
                    revision INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    doc TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_stories_expiry ON stories(expires_at);
                CREATE INDEX IF NOT EXISTS idx_stories_author ON stories(author_id);

                CREATE TABLE IF NOT EXISTS products (
                    id TEXT PRIMARY KEY,
                    business_id TEXT NOT NULL,
                    category TEXT NOT NULL,
                    is_active INTEGER NOT NULL,
                    revision INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    doc TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_products_listing
                    ON products(is_active, category, created_at DESC);
                CREATE INDEX IF NOT EXISTS idx_products_business ON products(business_id);

                CREATE TABLE IF NOT EXISTS connections (
                    follower_id TEXT NOT NULL,
                    following_id TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    doc TEXT NOT NULL,
                    PRIMARY KEY (follower_id, following_id)
                );
                CREATE INDEX IF NOT EXISTS idx_connections_following
                    ON connections(following_id);

                CREATE TABLE IF NOT EXISTS notifications (
                    id TEXT PRIMARY KEY,
                    recipient_id TEXT NOT NULL,
                    is_read INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    doc TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_notifications_recipient
                    ON notifications(recipient_id, is_read, created_at DESC);

                CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    receiver_id TEXT NOT NULL,
                    is_read INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    doc TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_messages_conversation
                    ON messages(conversation_id, created_at);
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Create a new in-memory SQLite repository (for testing).
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| RepositoryError::storage(operation, "connection mutex poisoned"))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RepositoryError::storage(operation, e.to_string()))?
    }
}

// =============================================================================
// Column helpers
// =============================================================================

/// Sort key for `created_at`-style columns. Nanosecond precision keeps SQL
/// ordering identical to ordering the `DateTime` values themselves.
pub(super) fn ts(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

pub(super) fn to_i64(value: u64, operation: &'static str) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| {
        RepositoryError::storage(
            operation,
            format!("{} exceeds maximum storable value ({})", value, i64::MAX),
        )
    })
}

pub(super) fn to_json<T: Serialize>(value: &T, what: &'static str) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::storage(what, e.to_string()))
}

pub(super) fn from_json<T: DeserializeOwned>(
    json: &str,
    what: &'static str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(json).map_err(|_| RepositoryError::corruption(what))
}

/// Map a rusqlite error, turning constraint violations into `Duplicate`.
pub(super) fn insert_error(
    operation: &'static str,
    duplicate: &'static str,
) -> impl Fn(rusqlite::Error) -> RepositoryError {
    move |e| match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            RepositoryError::Duplicate(duplicate)
        }
        _ => RepositoryError::storage(operation, e.to_string()),
    }
}

pub(super) fn sql_error(operation: &'static str) -> impl Fn(rusqlite::Error) -> RepositoryError {
    move |e| RepositoryError::storage(operation, e.to_string())
}

/// Run a query whose first column is a JSON document.
pub(super) fn query_docs<T: DeserializeOwned, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    what: &'static str,
) -> Result<Vec<T>, RepositoryError> {
    let mut stmt = conn.prepare(sql).map_err(sql_error(what))?;
    let rows = stmt
        .query_map(params, |row| row.get::<_, String>(0))
        .map_err(sql_error(what))?;
    let mut out = Vec::new();
    for row in rows {
        let json = row.map_err(sql_error(what))?;
        out.push(from_json(&json, what)?);
    }
    Ok(out)
}

pub(super) fn query_doc<T: DeserializeOwned, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    what: &'static str,
) -> Result<Option<T>, RepositoryError> {
    let json: Option<String> = conn
        .query_row(sql, params, |row| row.get(0))
        .optional()
        .map_err(sql_error(what))?;
    json.map(|j| from_json(&j, what)).transpose()
}

pub(super) fn count<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    what: &'static str,
) -> Result<u64, RepositoryError> {
    let n: i64 = conn
        .query_row(sql, params, |row| row.get(0))
        .map_err(sql_error(what))?;
    Ok(u64::try_from(n).unwrap_or(0))
}

/// Work out why a compare-and-swap update touched no rows.
pub(super) fn cas_failure(
    conn: &Connection,
    table: &'static str,
    kind: &'static str,
    id: &str,
) -> RepositoryError {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", table);
    match conn
        .query_row(&sql, params![id], |_| Ok(()))
        .optional()
    {
        Ok(Some(())) => RepositoryError::conflict(kind, id),
        Ok(None) => RepositoryError::not_found(kind, id),
        Err(e) => RepositoryError::storage("check revision", e.to_string()),
    }
}

// =============================================================================
// Repository trait implementation
// =============================================================================

#[async_trait]
impl Repository for SqliteRepository {
    async fn insert_account(&self, account: &Account) -> Result<(), RepositoryError> {
        let account = account.clone();
        self.blocking("insert account", move |conn| {
            accounts::insert(conn, &account)
        })
        .await
    }

    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        let id = *id;
        self.blocking("get account", move |conn| accounts::get(conn, &id))
            .await
    }

    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let email = email.to_string();
        self.blocking("find account", move |conn| {
            accounts::find_by_email(conn, &email)
        })
        .await
    }

    async fn update_account(&self, account: &Account) -> Result<Account, RepositoryError> {
        let account = account.clone();
        self.blocking("update account", move |conn| {
            accounts::update(conn, account)
        })
        .await
    }

    async fn delete_account(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        let id = *id;
        self.blocking("delete account", move |conn| accounts::delete(conn, &id))
            .await
    }

    async fn get_accounts(&self, ids: &[AccountId]) -> Result<Vec<Account>, RepositoryError> {
        let ids = ids.to_vec();
        self.blocking("get accounts", move |conn| {
            let mut out = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(account) = accounts::get(conn, id)? {
                    out.push(account);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn insert_post(&self, post: &Post) -> Result<(), RepositoryError> {
        let post = post.clone();
        self.blocking("insert post", move |conn| posts::insert(conn, &post))
            .await
    }

    async fn get_post(&self, id: &PostId) -> Result<Option<Post>, RepositoryError> {
        let id = *id;
        self.blocking("get post", move |conn| posts::get(conn, &id)).await
    }

    async fn update_post(&self, post: &Post) -> Result<Post, RepositoryError> {
        let post = post.clone();
        self.blocking("update post", move |conn| posts::update(conn, post))
            .await
    }

    async fn delete_post(&self, id: &PostId) -> Result<Option<Post>, RepositoryError> {
        let id = *id;
        self.blocking("delete post", move |conn| posts::delete(conn, &id))
            .await
    }

    async fn list_feed(&self, page: Page) -> Result<(Vec<Post>, u64), RepositoryError> {
        self.blocking("list feed", move |conn| posts::feed(conn, page))
            .await
    }

    async fn list_pending_posts(
        &self,
        exclude_author: &AccountId,
    ) -> Result<Vec<Post>, RepositoryError> {
        let exclude = *exclude_author;
        self.blocking("list pending posts", move |conn| {
            posts::pending(conn, &exclude)
        })
        .await
    }

    async fn delete_posts_by_author(
        &self,
        author: &AccountId,
    ) -> Result<Vec<Post>, RepositoryError> {
        let author = *author;
        self.blocking("delete posts by author", move |conn| {
            posts::delete_by_author(conn, &author)
        })
        .await
    }

    async fn insert_review(&self, review: &Review) -> Result<(), RepositoryError> {
        let review = review.clone();
        self.blocking("insert review", move |conn| {
            posts::insert_review(conn, &review)
        })
        .await
    }

    async fn list_reviews_by_reviewer(
        &self,
        reviewer: &AccountId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let reviewer = *reviewer;
        self.blocking("list reviews", move |conn| {
            posts::reviews_by(conn, &reviewer)
        })
        .await
    }

    async fn insert_story(&self, story: &Story) -> Result<(), RepositoryError> {
        let story = story.clone();
        self.blocking("insert story", move |conn| stories::insert(conn, &story))
            .await
    }

    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>, RepositoryError> {
        let id = *id;
        self.blocking("get story", move |conn| stories::get(conn, &id))
            .await
    }

    async fn update_story(&self, story: &Story) -> Result<Story, RepositoryError> {
        let story = story.clone();
        self.blocking("update story", move |conn| stories::update(conn, story))
            .await
    }

    async fn delete_story(&self, id: &StoryId) -> Result<Option<Story>, RepositoryError> {
        let id = *id;
        self.blocking("delete story", move |conn| stories::delete(conn, &id))
            .await
    }

    async fn list_active_stories(
        &self,
        author: Option<&AccountId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Story>, RepositoryError> {
        let author = author.copied();
        self.blocking("list stories", move |conn| {
            stories::active(conn, author.as_ref(), now)
        })
        .await
    }

    async fn purge_expired_stories(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Story>, RepositoryError> {
        self.blocking("purge stories", move |conn| stories::purge_expired(conn, now))
            .await
    }

    async fn delete_stories_by_author(
        &self,
        author: &AccountId,
    ) -> Result<Vec<Story>, RepositoryError> {
        let author = *author;
        self.blocking("delete stories by author", move |conn| {
            stories::delete_by_author(conn, &author)
        })
        .await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let product = product.clone();
        self.blocking("insert product", move |conn| {
            products::insert(conn, &product)
        })
        .await
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let id = *id;
        self.blocking("get product", move |conn| products::get(conn, &id))
            .await
    }

    async fn update_product(&self, product: &Product) -> Result<Product, RepositoryError> {
        let product = product.clone();
        self.blocking("update product", move |conn| {
            products::update(conn, product)
        })
        .await
    }

    async fn delete_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let id = *id;
        self.blocking("delete product", move |conn| products::delete(conn, &id))
            .await
    }

    async fn list_products(
        &self,
        query: &ProductQuery,
        page: Page,
    ) -> Result<(Vec<Product>, u64), RepositoryError> {
        let query = query.clone();
        self.blocking("list products", move |conn| {
            products::list(conn, &query, page)
        })
        .await
    }

    async fn list_products_by_business(
        &self,
        business: &AccountId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let business = *business;
        self.blocking("list business products", move |conn| {
            products::by_business(conn, &business)
        })
        .await
    }

    async fn delete_products_by_business(
        &self,
        business: &AccountId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let business = *business;
        self.blocking("delete business products", move |conn| {
            products::delete_by_business(conn, &business)
        })
        .await
    }

    async fn insert_connection(&self, connection: &Follow) -> Result<(), RepositoryError> {
        let connection = connection.clone();
        self.blocking("insert connection", move |conn| {
            social::insert_connection(conn, &connection)
        })
        .await
    }

    async fn delete_connection(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> Result<bool, RepositoryError> {
        let (follower, following) = (*follower, *following);
        self.blocking("delete connection", move |conn| {
            social::delete_connection(conn, &follower, &following)
        })
        .await
    }

    async fn list_followers(&self, account: &AccountId) -> Result<Vec<Follow>, RepositoryError> {
        let account = *account;
        self.blocking("list followers", move |conn| {
            social::followers(conn, &account)
        })
        .await
    }

    async fn list_following(&self, account: &AccountId) -> Result<Vec<Follow>, RepositoryError> {
        let account = *account;
        self.blocking("list following", move |conn| {
            social::following(conn, &account)
        })
        .await
    }

    async fn delete_connections_of(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Follow>, RepositoryError> {
        let account = *account;
        self.blocking("delete connections", move |conn| {
            social::delete_connections_of(conn, &account)
        })
        .await
    }

    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<(), RepositoryError> {
        let notification = notification.clone();
        self.blocking("insert notification", move |conn| {
            social::insert_notification(conn, &notification)
        })
        .await
    }

    async fn list_notifications(
        &self,
        recipient: &AccountId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let recipient = *recipient;
        self.blocking("list notifications", move |conn| {
            social::notifications(conn, &recipient, unread_only)
        })
        .await
    }

    async fn count_unread_notifications(
        &self,
        recipient: &AccountId,
    ) -> Result<u64, RepositoryError> {
        let recipient = *recipient;
        self.blocking("count notifications", move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
                params![recipient.to_string()],
                "count notifications",
            )
        })
        .await
    }

    async fn mark_notification_read(
        &self,
        recipient: &AccountId,
        id: &NotificationId,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, RepositoryError> {
        let (recipient, id) = (*recipient, *id);
        self.blocking("mark notification read", move |conn| {
            social::mark_notification_read(conn, &recipient, &id, now)
        })
        .await
    }

    async fn mark_all_notifications_read(
        &self,
        recipient: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let recipient = *recipient;
        self.blocking("mark notifications read", move |conn| {
            social::mark_all_notifications_read(conn, &recipient, now)
        })
        .await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), RepositoryError> {
        let message = message.clone();
        self.blocking("insert message", move |conn| {
            social::insert_message(conn, &message)
        })
        .await
    }

    async fn list_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, RepositoryError> {
        let conversation_id = conversation_id.to_string();
        self.blocking("list conversation", move |conn| {
            social::conversation(conn, &conversation_id)
        })
        .await
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        receiver: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let conversation_id = conversation_id.to_string();
        let receiver = *receiver;
        self.blocking("mark conversation read", move |conn| {
            social::mark_conversation_read(conn, &conversation_id, &receiver, now)
        })
        .await
    }

    async fn counts(&self, now: DateTime<Utc>) -> Result<StorageCounts, RepositoryError> {
        self.blocking("counts", move |conn| {
            let conn: &Connection = conn;
            let by = |sql: &str, value: &str| count(conn, sql, params![value], "counts");
            let accounts = "SELECT COUNT(*) FROM accounts WHERE role = ?1";
            let posts = "SELECT COUNT(*) FROM posts WHERE status = ?1";
            Ok(StorageCounts {
                users: by(accounts, "User")?,
                reviewers: by(accounts, "Reviewer")?,
                businesses: by(accounts, "Business")?,
                pending_posts: by(posts, "pending")?,
                approved_posts: by(posts, "approved")?,
                rejected_posts: by(posts, "rejected")?,
                active_stories: count(
                    conn,
                    "SELECT COUNT(*) FROM stories WHERE expires_at > ?1",
                    params![ts(now)],
                    "counts",
                )?,
                active_products: count(
                    conn,
                    "SELECT COUNT(*) FROM products WHERE is_active = 1",
                    [],
                    "counts",
                )?,
            })
        })
        .await
    }
}
