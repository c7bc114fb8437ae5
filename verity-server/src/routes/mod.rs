//! HTTP handlers, one module per `/api` resource.

mod auth;
mod messages;
mod notifications;
mod posts;
mod products;
mod reviews;
mod stories;
mod users;
pub mod views;


use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use serde::Deserialize;

use crate::error::ApiError;
use crate::uploads::UploadStore;
use crate::AppState;
use verity_core::MediaItem;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/posts", posts::router())
        .nest("/reviews", reviews::router())
        .nest("/users", users::router())
        .nest("/stories", stories::router())
        .nest("/products", products::router())
        .nest("/notifications", notifications::router())
        .nest("/messages", messages::router())
}

/// Parse a path id; anything malformed is reported as a missing `what`.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("{} not found", what)))
}

/// `?page=&limit=` as sent by clients.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Parse a list field sent through a multipart form: a JSON array of
/// strings, or a comma separated list.
pub(crate) fn parse_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(items) => items,
        Err(_) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

/// Remove freshly uploaded files when the request they came with fails.
pub(crate) async fn discard_on_error<T>(
    uploads: &UploadStore,
    files: &[MediaItem],
    result: Result<T, ApiError>,
) -> Result<T, ApiError> {
    if result.is_err() {
        uploads
            .delete_all(files.iter().map(|m| m.url.clone()).collect())
            .await;
    }
    result
}
