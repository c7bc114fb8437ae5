//! Product rows.
//!
//! Category and activity filter in SQL; the text search runs over the decoded
//! documents with the same `ProductQuery::matches` the in-memory backend uses.

use rusqlite::{params, Connection};

use super::{cas_failure, insert_error, query_doc, query_docs, sql_error, to_i64, to_json, ts};
use crate::repository::RepositoryError;
use verity_core::{AccountId, Page, Product, ProductId, ProductQuery};

pub(super) fn insert(conn: &Connection, product: &Product) -> Result<(), RepositoryError> {
    let doc = to_json(product, "serialize product")?;
    conn.execute(
        "INSERT INTO products (id, business_id, category, is_active, revision, created_at, doc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            product.id.to_string(),
            product.business.to_string(),
            product.category.as_str(),
            product.is_active,
            to_i64(product.revision, "insert product")?,
            ts(product.created_at),
            doc
        ],
    )
    .map_err(insert_error("insert product", "product id"))?;
    Ok(())
}

pub(super) fn get(conn: &Connection, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
    query_doc(
        conn,
        "SELECT doc FROM products WHERE id = ?1",
        params![id.to_string()],
        "product",
    )
}

pub(super) fn update(conn: &Connection, mut product: Product) -> Result<Product, RepositoryError> {
    let expected = to_i64(product.revision, "update product")?;
    product.revision += 1;
    let doc = to_json(&product, "serialize product")?;
    let id = product.id.to_string();
    let changed = conn
        .execute(
            "UPDATE products SET category = ?1, is_active = ?2, revision = ?3, doc = ?4
             WHERE id = ?5 AND revision = ?6",
            params![
                product.category.as_str(),
                product.is_active,
                expected + 1,
                doc,
                id,
                expected
            ],
        )
        .map_err(sql_error("update product"))?;
    if changed == 0 {
        return Err(cas_failure(conn, "products", "product", &id));
    }
    Ok(product)
}

pub(super) fn delete(
    conn: &Connection,
    id: &ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let existing = get(conn, id)?;
    if existing.is_some() {
        conn.execute("DELETE FROM products WHERE id = ?1", params![id.to_string()])
            .map_err(sql_error("delete product"))?;
    }
    Ok(existing)
}

pub(super) fn list(
    conn: &Connection,
    query: &ProductQuery,
    page: Page,
) -> Result<(Vec<Product>, u64), RepositoryError> {
    let candidates: Vec<Product> = match query.category {
        Some(category) => query_docs(
            conn,
            "SELECT doc FROM products WHERE is_active = 1 AND category = ?1
             ORDER BY created_at DESC, id DESC",
            params![category.as_str()],
            "product",
        )?,
        None => query_docs(
            conn,
            "SELECT doc FROM products WHERE is_active = 1 ORDER BY created_at DESC, id DESC",
            [],
            "product",
        )?,
    };
    let matching: Vec<Product> = candidates
        .into_iter()
        .filter(|p| query.matches(p))
        .collect();
    let total = matching.len() as u64;
    Ok((page.slice(matching), total))
}

pub(super) fn by_business(
    conn: &Connection,
    business: &AccountId,
) -> Result<Vec<Product>, RepositoryError> {
    query_docs(
        conn,
        "SELECT doc FROM products WHERE business_id = ?1 ORDER BY created_at DESC, id DESC",
        params![business.to_string()],
        "product",
    )
}

pub(super) fn delete_by_business(
    conn: &mut Connection,
    business: &AccountId,
) -> Result<Vec<Product>, RepositoryError> {
    let tx = conn.transaction().map_err(sql_error("begin transaction"))?;
    let products = query_docs(
        &tx,
        "SELECT doc FROM products WHERE business_id = ?1",
        params![business.to_string()],
        "product",
    )?;
    tx.execute(
        "DELETE FROM products WHERE business_id = ?1",
        params![business.to_string()],
    )
    .map_err(sql_error("delete business products"))?;
    tx.commit().map_err(sql_error("commit transaction"))?;
    Ok(products)
}
