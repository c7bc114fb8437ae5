//! Story rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{cas_failure, insert_error, query_doc, query_docs, sql_error, to_i64, to_json, ts};
use crate::repository::RepositoryError;
use verity_core::{AccountId, Story, StoryId};

pub(super) fn insert(conn: &Connection, story: &Story) -> Result<(), RepositoryError> {
    let doc = to_json(story, "serialize story")?;
    conn.execute(
        "INSERT INTO stories (id, author_id, expires_at, revision, created_at, doc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            story.id.to_string(),
            story.author.to_string(),
            ts(story.expires_at),
            to_i64(story.revision, "insert story")?,
            ts(story.created_at),
            doc
        ],
    )
    .map_err(insert_error("insert story", "story id"))?;
    Ok(())
}

pub(super) fn get(conn: &Connection, id: &StoryId) -> Result<Option<Story>, RepositoryError> {
    query_doc(
        conn,
        "SELECT doc FROM stories WHERE id = ?1",
        params![id.to_string()],
        "story",
    )
}

pub(super) fn update(conn: &Connection, mut story: Story) -> Result<Story, RepositoryError> {
    let expected = to_i64(story.revision, "update story")?;
    story.revision += 1;
    let doc = to_json(&story, "serialize story")?;
    let id = story.id.to_string();
    let changed = conn
        .execute(
            "UPDATE stories SET expires_at = ?1, revision = ?2, doc = ?3
             WHERE id = ?4 AND revision = ?5",
            params![ts(story.expires_at), expected + 1, doc, id, expected],
        )
        .map_err(sql_error("update story"))?;
    if changed == 0 {
        return Err(cas_failure(conn, "stories", "story", &id));
    }
    Ok(story)
}

pub(super) fn delete(conn: &Connection, id: &StoryId) -> Result<Option<Story>, RepositoryError> {
    let existing = get(conn, id)?;
    if existing.is_some() {
        conn.execute("DELETE FROM stories WHERE id = ?1", params![id.to_string()])
            .map_err(sql_error("delete story"))?;
    }
    Ok(existing)
}

pub(super) fn active(
    conn: &Connection,
    author: Option<&AccountId>,
    now: DateTime<Utc>,
) -> Result<Vec<Story>, RepositoryError> {
    match author {
        Some(author) => query_docs(
            conn,
            "SELECT doc FROM stories WHERE expires_at > ?1 AND author_id = ?2
             ORDER BY created_at DESC, id DESC",
            params![ts(now), author.to_string()],
            "story",
        ),
        None => query_docs(
            conn,
            "SELECT doc FROM stories WHERE expires_at > ?1 ORDER BY created_at DESC, id DESC",
            params![ts(now)],
            "story",
        ),
    }
}

pub(super) fn purge_expired(
    conn: &mut Connection,
    now: DateTime<Utc>,
) -> Result<Vec<Story>, RepositoryError> {
    let tx = conn.transaction().map_err(sql_error("begin transaction"))?;
    let expired = query_docs(
        &tx,
        "SELECT doc FROM stories WHERE expires_at <= ?1",
        params![ts(now)],
        "story",
    )?;
    tx.execute(
        "DELETE FROM stories WHERE expires_at <= ?1",
        params![ts(now)],
    )
    .map_err(sql_error("purge stories"))?;
    tx.commit().map_err(sql_error("commit transaction"))?;
    Ok(expired)
}

pub(super) fn delete_by_author(
    conn: &mut Connection,
    author: &AccountId,
) -> Result<Vec<Story>, RepositoryError> {
    let tx = conn.transaction().map_err(sql_error("begin transaction"))?;
    let stories = query_docs(
        &tx,
        "SELECT doc FROM stories WHERE author_id = ?1",
        params![author.to_string()],
        "story",
    )?;
    tx.execute(
        "DELETE FROM stories WHERE author_id = ?1",
        params![author.to_string()],
    )
    .map_err(sql_error("delete stories by author"))?;
    tx.commit().map_err(sql_error("commit transaction"))?;
    Ok(stories)
}
