//! Connections, notifications and messages.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{insert_error, query_doc, query_docs, sql_error, to_json, ts};
use crate::repository::RepositoryError;
use verity_core::{AccountId, Connection as Follow, Message, Notification, NotificationId};

pub(super) fn insert_connection(conn: &Connection, follow: &Follow) -> Result<(), RepositoryError> {
    let doc = to_json(follow, "serialize connection")?;
    conn.execute(
        "INSERT INTO connections (follower_id, following_id, created_at, doc)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            follow.follower.to_string(),
            follow.following.to_string(),
            ts(follow.created_at),
            doc
        ],
    )
    .map_err(insert_error("insert connection", "connection"))?;
    Ok(())
}

pub(super) fn delete_connection(
    conn: &Connection,
    follower: &AccountId,
    following: &AccountId,
) -> Result<bool, RepositoryError> {
    let removed = conn
        .execute(
            "DELETE FROM connections WHERE follower_id = ?1 AND following_id = ?2",
            params![follower.to_string(), following.to_string()],
        )
        .map_err(sql_error("delete connection"))?;
    Ok(removed > 0)
}

pub(super) fn followers(
    conn: &Connection,
    account: &AccountId,
) -> Result<Vec<Follow>, RepositoryError> {
    query_docs(
        conn,
        "SELECT doc FROM connections WHERE following_id = ?1
         ORDER BY created_at DESC, follower_id DESC",
        params![account.to_string()],
        "connection",
    )
}

pub(super) fn following(
    conn: &Connection,
    account: &AccountId,
) -> Result<Vec<Follow>, RepositoryError> {
    query_docs(
        conn,
        "SELECT doc FROM connections WHERE follower_id = ?1
         ORDER BY created_at DESC, following_id DESC",
        params![account.to_string()],
        "connection",
    )
}

pub(super) fn delete_connections_of(
    conn: &mut Connection,
    account: &AccountId,
) -> Result<Vec<Follow>, RepositoryError> {
    let id = account.to_string();
    let tx = conn.transaction().map_err(sql_error("begin transaction"))?;
    let removed = query_docs(
        &tx,
        "SELECT doc FROM connections WHERE follower_id = ?1 OR following_id = ?1",
        params![id],
        "connection",
    )?;
    tx.execute(
        "DELETE FROM connections WHERE follower_id = ?1 OR following_id = ?1",
        params![id],
    )
    .map_err(sql_error("delete connections"))?;
    tx.commit().map_err(sql_error("commit transaction"))?;
    Ok(removed)
}

fn write_notification(conn: &Connection, n: &Notification) -> Result<(), RepositoryError> {
    let doc = to_json(n, "serialize notification")?;
    conn.execute(
        "INSERT OR REPLACE INTO notifications (id, recipient_id, is_read, created_at, doc)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            n.id.to_string(),
            n.recipient.to_string(),
            n.is_read,
            ts(n.created_at),
            doc
        ],
    )
    .map_err(sql_error("write notification"))?;
    Ok(())
}

pub(super) fn insert_notification(
    conn: &Connection,
    notification: &Notification,
) -> Result<(), RepositoryError> {
    write_notification(conn, notification)
}

pub(super) fn notifications(
    conn: &Connection,
    recipient: &AccountId,
    unread_only: bool,
) -> Result<Vec<Notification>, RepositoryError> {
    let sql = if unread_only {
        "SELECT doc FROM notifications WHERE recipient_id = ?1 AND is_read = 0
         ORDER BY created_at DESC, id DESC"
    } else {
        "SELECT doc FROM notifications WHERE recipient_id = ?1
         ORDER BY created_at DESC, id DESC"
    };
    query_docs(conn, sql, params![recipient.to_string()], "notification")
}

pub(super) fn mark_notification_read(
    conn: &mut Connection,
    recipient: &AccountId,
    id: &NotificationId,
    now: DateTime<Utc>,
) -> Result<Option<Notification>, RepositoryError> {
    let tx = conn.transaction().map_err(sql_error("begin transaction"))?;
    let found: Option<Notification> = query_doc(
        &tx,
        "SELECT doc FROM notifications WHERE id = ?1 AND recipient_id = ?2",
        params![id.to_string(), recipient.to_string()],
        "notification",
    )?;
    let Some(mut notification) = found else {
        return Ok(None);
    };
    if notification.mark_read(now) {
        write_notification(&tx, &notification)?;
    }
    tx.commit().map_err(sql_error("commit transaction"))?;
    Ok(Some(notification))
}

pub(super) fn mark_all_notifications_read(
    conn: &mut Connection,
    recipient: &AccountId,
    now: DateTime<Utc>,
) -> Result<u64, RepositoryError> {
    let tx = conn.transaction().map_err(sql_error("begin transaction"))?;
    let unread: Vec<Notification> = query_docs(
        &tx,
        "SELECT doc FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
        params![recipient.to_string()],
        "notification",
    )?;
    let mut updated = 0;
    for mut notification in unread {
        if notification.mark_read(now) {
            write_notification(&tx, &notification)?;
            updated += 1;
        }
    }
    tx.commit().map_err(sql_error("commit transaction"))?;
    Ok(updated)
}

fn write_message(conn: &Connection, m: &Message) -> Result<(), RepositoryError> {
    let doc = to_json(m, "serialize message")?;
    conn.execute(
        "INSERT OR REPLACE INTO messages (id, conversation_id, receiver_id, is_read, created_at, doc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            m.id.to_string(),
            m.conversation_id,
            m.receiver.to_string(),
            m.is_read,
            ts(m.created_at),
            doc
        ],
    )
    .map_err(sql_error("write message"))?;
    Ok(())
}

pub(super) fn insert_message(conn: &Connection, message: &Message) -> Result<(), RepositoryError> {
    write_message(conn, message)
}

pub(super) fn conversation(
    conn: &Connection,
    conversation_id: &str,
) -> Result<Vec<Message>, RepositoryError> {
    query_docs(
        conn,
        "SELECT doc FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, id ASC",
        params![conversation_id],
        "message",
    )
}

pub(super) fn mark_conversation_read(
    conn: &mut Connection,
    conversation_id: &str,
    receiver: &AccountId,
    now: DateTime<Utc>,
) -> Result<u64, RepositoryError> {
    let tx = conn.transaction().map_err(sql_error("begin transaction"))?;
    let unread: Vec<Message> = query_docs(
        &tx,
        "SELECT doc FROM messages WHERE conversation_id = ?1 AND receiver_id = ?2 AND is_read = 0",
        params![conversation_id, receiver.to_string()],
        "message",
    )?;
    let updated = unread.len() as u64;
    for mut message in unread {
        message.is_read = true;
        message.read_at = Some(now);
        write_message(&tx, &message)?;
    }
    tx.commit().map_err(sql_error("commit transaction"))?;
    Ok(updated)
}
