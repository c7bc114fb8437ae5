//! Account rows.

use rusqlite::{params, Connection};

use super::{cas_failure, insert_error, query_doc, sql_error, to_i64, to_json, ts};
use crate::repository::RepositoryError;
use verity_core::{Account, AccountId};

pub(super) fn insert(conn: &Connection, account: &Account) -> Result<(), RepositoryError> {
    let doc = to_json(account, "serialize account")?;
    conn.execute(
        "INSERT INTO accounts (id, email, role, revision, created_at, doc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            account.id.to_string(),
            account.email,
            account.role.as_str(),
            to_i64(account.revision, "insert account")?,
            ts(account.created_at),
            doc
        ],
    )
    .map_err(insert_error("insert account", "email"))?;
    Ok(())
}

pub(super) fn get(conn: &Connection, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
    query_doc(
        conn,
        "SELECT doc FROM accounts WHERE id = ?1",
        params![id.to_string()],
        "account",
    )
}

pub(super) fn find_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Account>, RepositoryError> {
    query_doc(
        conn,
        "SELECT doc FROM accounts WHERE email = ?1",
        params![email],
        "account",
    )
}

pub(super) fn update(conn: &Connection, mut account: Account) -> Result<Account, RepositoryError> {
    let expected = to_i64(account.revision, "update account")?;
    account.revision += 1;
    let doc = to_json(&account, "serialize account")?;
    let id = account.id.to_string();
    let changed = conn
        .execute(
            "UPDATE accounts SET email = ?1, role = ?2, revision = ?3, doc = ?4
             WHERE id = ?5 AND revision = ?6",
            params![
                account.email,
                account.role.as_str(),
                expected + 1,
                doc,
                id,
                expected
            ],
        )
        .map_err(insert_error("update account", "email"))?;
    if changed == 0 {
        return Err(cas_failure(conn, "accounts", "account", &id));
    }
    Ok(account)
}

pub(super) fn delete(conn: &Connection, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
    let existing = get(conn, id)?;
    if existing.is_some() {
        conn.execute(
            "DELETE FROM accounts WHERE id = ?1",
            params![id.to_string()],
        )
        .map_err(sql_error("delete account"))?;
    }
    Ok(existing)
}
