use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::views::{summaries, StoryEntry};
use super::{discard_on_error, parse_id};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ApiMultipart;
use crate::repository::modify;
use crate::AppState;
use verity_core::{
    check_optional_text, group_in_order, AccountId, AccountSummary, Story, StoryId, UploadKind,
    CAPTION_MAX_LEN,
};

pub(super) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(list_stories)
                .post(create_story)
                .layer(DefaultBodyLimit::max(UploadKind::Story.max_request_bytes())),
        )
        .route("/user/:user_id", get(user_stories))
        .route("/:story_id/view", post(view_story))
        .route("/:story_id", delete(delete_story))
}

async fn create_story(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = state
        .uploads
        .read_form(&user.id(), UploadKind::Story, multipart)
        .await?;

    let built = (|| {
        let media = form
            .files
            .first()
            .ok_or_else(|| ApiError::bad_request("Media file is required"))?;
        let caption =
            check_optional_text("caption", form.raw("caption").unwrap_or_default(), CAPTION_MAX_LEN)?;
        Ok::<_, ApiError>(Story::new(
            user.id(),
            user.role(),
            media.url.clone(),
            media.kind,
            caption,
            Utc::now(),
        ))
    })();
    let story = discard_on_error(&state.uploads, &form.files, built).await?;

    let inserted = state.repository.insert_story(&story).await.map_err(ApiError::from);
    discard_on_error(&state.uploads, &form.files, inserted).await?;
    info!("Story {} created by {}", story.id, user.id());

    let authors = summaries(state.repository.as_ref(), [story.author]).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Story created successfully",
            "story": StoryEntry::new(story, &user.id(), &authors),
        })),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoryGroup {
    author: Option<AccountSummary>,
    stories: Vec<StoryEntry>,
    has_unviewed: bool,
}

async fn list_stories(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let stories = state
        .repository
        .list_active_stories(None, Utc::now())
        .await?;
    let authors = summaries(state.repository.as_ref(), stories.iter().map(|s| s.author)).await?;

    let viewer = user.id();
    let groups: Vec<StoryGroup> = group_in_order(stories, |s| s.author)
        .into_iter()
        .map(|(author, stories)| {
            let stories: Vec<StoryEntry> = stories
                .into_iter()
                .map(|s| StoryEntry::new(s, &viewer, &authors))
                .collect();
            StoryGroup {
                author: authors.get(&author).cloned(),
                has_unviewed: stories.iter().any(|s| !s.has_viewed),
                stories,
            }
        })
        .collect();

    Ok(Json(json!({ "success": true, "stories": groups })))
}

async fn user_stories(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let author: AccountId = parse_id(&user_id, "User")?;
    let stories = state
        .repository
        .list_active_stories(Some(&author), Utc::now())
        .await?;
    let authors = summaries(state.repository.as_ref(), [author]).await?;
    let stories: Vec<StoryEntry> = stories
        .into_iter()
        .map(|s| StoryEntry::new(s, &user.id(), &authors))
        .collect();

    Ok(Json(json!({ "success": true, "stories": stories })))
}

async fn view_story(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(story_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: StoryId = parse_id(&story_id, "Story")?;
    let now = Utc::now();
    let (story, _) = modify::<Story, _, ApiError, _>(state.repository.as_ref(), &id, |story| {
        if !story.is_active(now) {
            return Err(ApiError::not_found("Story not found"));
        }
        Ok(story.record_view(user.id(), now))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Story not found"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Story viewed",
        "viewCount": story.view_count,
    })))
}

async fn delete_story(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(story_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: StoryId = parse_id(&story_id, "Story")?;
    let story = state
        .repository
        .get_story(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Story not found"))?;
    if story.author != user.id() {
        return Err(ApiError::forbidden("Not authorized to delete this story"));
    }

    if let Some(story) = state.repository.delete_story(&id).await? {
        state.uploads.delete_url(&story.media_url).await;
    }
    Ok(Json(json!({
        "success": true,
        "message": "Story deleted successfully",
    })))
}
