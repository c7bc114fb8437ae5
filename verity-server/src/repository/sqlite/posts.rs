//! Post and review rows.

use rusqlite::{params, Connection};

use super::{
    cas_failure, count, insert_error, query_doc, query_docs, sql_error, to_i64, to_json, ts,
};
use crate::repository::RepositoryError;
use verity_core::{AccountId, Page, Post, PostId, Review};

pub(super) fn insert(conn: &Connection, post: &Post) -> Result<(), RepositoryError> {
    let doc = to_json(post, "serialize post")?;
    conn.execute(
        "INSERT INTO posts (id, author_id, visibility, status, revision, created_at, doc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            post.id.to_string(),
            post.author.to_string(),
            post.visibility.as_str(),
            post.status().as_str(),
            to_i64(post.revision, "insert post")?,
            ts(post.created_at),
            doc
        ],
    )
    .map_err(insert_error("insert post", "post id"))?;
    Ok(())
}

pub(super) fn get(conn: &Connection, id: &PostId) -> Result<Option<Post>, RepositoryError> {
    query_doc(
        conn,
        "SELECT doc FROM posts WHERE id = ?1",
        params![id.to_string()],
        "post",
    )
}

pub(super) fn update(conn: &Connection, mut post: Post) -> Result<Post, RepositoryError> {
    let expected = to_i64(post.revision, "update post")?;
    post.revision += 1;
    let doc = to_json(&post, "serialize post")?;
    let id = post.id.to_string();
    let changed = conn
        .execute(
            "UPDATE posts SET visibility = ?1, status = ?2, revision = ?3, doc = ?4
             WHERE id = ?5 AND revision = ?6",
            params![
                post.visibility.as_str(),
                post.status().as_str(),
                expected + 1,
                doc,
                id,
                expected
            ],
        )
        .map_err(sql_error("update post"))?;
    if changed == 0 {
        return Err(cas_failure(conn, "posts", "post", &id));
    }
    Ok(post)
}

pub(super) fn delete(conn: &Connection, id: &PostId) -> Result<Option<Post>, RepositoryError> {
    let existing = get(conn, id)?;
    if existing.is_some() {
        conn.execute("DELETE FROM posts WHERE id = ?1", params![id.to_string()])
            .map_err(sql_error("delete post"))?;
    }
    Ok(existing)
}

pub(super) fn feed(conn: &Connection, page: Page) -> Result<(Vec<Post>, u64), RepositoryError> {
    let total = count(
        conn,
        "SELECT COUNT(*) FROM posts WHERE status = 'approved' AND visibility = 'public'",
        [],
        "count feed",
    )?;
    let posts = query_docs(
        conn,
        "SELECT doc FROM posts WHERE status = 'approved' AND visibility = 'public'
         ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        params![
            to_i64(page.limit() as u64, "feed limit")?,
            to_i64(page.offset() as u64, "feed offset")?
        ],
        "post",
    )?;
    Ok((posts, total))
}

pub(super) fn pending(
    conn: &Connection,
    exclude_author: &AccountId,
) -> Result<Vec<Post>, RepositoryError> {
    query_docs(
        conn,
        "SELECT doc FROM posts WHERE status = 'pending' AND author_id != ?1
         ORDER BY created_at DESC, id DESC",
        params![exclude_author.to_string()],
        "post",
    )
}

pub(super) fn delete_by_author(
    conn: &mut Connection,
    author: &AccountId,
) -> Result<Vec<Post>, RepositoryError> {
    let tx = conn.transaction().map_err(sql_error("begin transaction"))?;
    let posts = query_docs(
        &tx,
        "SELECT doc FROM posts WHERE author_id = ?1 ORDER BY created_at DESC, id DESC",
        params![author.to_string()],
        "post",
    )?;
    tx.execute(
        "DELETE FROM posts WHERE author_id = ?1",
        params![author.to_string()],
    )
    .map_err(sql_error("delete posts by author"))?;
    tx.commit().map_err(sql_error("commit transaction"))?;
    Ok(posts)
}

pub(super) fn insert_review(conn: &Connection, review: &Review) -> Result<(), RepositoryError> {
    let doc = to_json(review, "serialize review")?;
    conn.execute(
        "INSERT INTO reviews (id, reviewer_id, post_id, created_at, doc)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            review.id.to_string(),
            review.reviewer.to_string(),
            review.post.to_string(),
            ts(review.created_at),
            doc
        ],
    )
    .map_err(insert_error("insert review", "review id"))?;
    Ok(())
}

pub(super) fn reviews_by(
    conn: &Connection,
    reviewer: &AccountId,
) -> Result<Vec<Review>, RepositoryError> {
    query_docs(
        conn,
        "SELECT doc FROM reviews WHERE reviewer_id = ?1 ORDER BY created_at DESC, id DESC",
        params![reviewer.to_string()],
        "review",
    )
}
