use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_id;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::AppState;
use verity_core::NotificationId;

pub(super) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", put(mark_all_read))
        .route("/:id/read", put(mark_read))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    unread: Option<bool>,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let notifications = state
        .repository
        .list_notifications(&user.id(), params.unread.unwrap_or(false))
        .await?;
    let unread = state
        .repository
        .count_unread_notifications(&user.id())
        .await?;

    Ok(Json(json!({
        "success": true,
        "notifications": notifications,
        "unreadCount": unread,
    })))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: NotificationId = parse_id(&id, "Notification")?;
    let notification = state
        .repository
        .mark_notification_read(&user.id(), &id, Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    Ok(Json(json!({ "success": true, "notification": notification })))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let updated = state
        .repository
        .mark_all_notifications_read(&user.id(), Utc::now())
        .await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}
