use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::parse_id;
use super::posts::notify;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;
use verity_core::{
    check_text, conversation_id, AccountId, Message, Notification, NotificationKind,
    NOTES_MAX_LEN,
};

pub(super) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(send_message))
        .route("/conversations/:user_id", get(conversation))
        .route("/conversations/:user_id/read", put(mark_conversation_read))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest {
    receiver_id: Option<String>,
    message: Option<String>,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<SendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(receiver), Some(text)) = (body.receiver_id, body.message) else {
        return Err(ApiError::bad_request(
            "Please provide receiverId and message",
        ));
    };
    let receiver: AccountId = parse_id(&receiver, "User")?;
    if receiver == user.id() {
        return Err(ApiError::bad_request("You cannot message yourself"));
    }
    let text = check_text("message", &text, NOTES_MAX_LEN)?;
    if state.repository.get_account(&receiver).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let now = Utc::now();
    let message = Message::new(user.id(), receiver, text, now);
    state.repository.insert_message(&message).await?;
    debug!("Message {} sent in {}", message.id, message.conversation_id);

    let notification = Notification::new(
        receiver,
        NotificationKind::Message,
        "New message",
        format!("{} sent you a message", user.0.user_info.full_name),
        now,
    )
    .with_account(user.id());
    notify(state.repository.as_ref(), notification).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": message })),
    ))
}

async fn conversation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let other: AccountId = parse_id(&user_id, "User")?;
    let messages = state
        .repository
        .list_conversation(&conversation_id(&user.id(), &other))
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": messages.len(),
        "messages": messages,
    })))
}

async fn mark_conversation_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let other: AccountId = parse_id(&user_id, "User")?;
    let updated = state
        .repository
        .mark_conversation_read(&conversation_id(&user.id(), &other), &user.id(), Utc::now())
        .await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}
