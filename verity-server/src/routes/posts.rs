use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::views::PostView;
use super::{discard_on_error, parse_id, parse_list, PageParams};
use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiMultipart, ApiQuery};
use crate::repository::{modify, Repository, RepositoryError};
use crate::AppState;
use verity_core::{
    normalize_hashtags, Account, AccountId, Comment, Like, Notification, NotificationKind, Page,
    Post, PostId, ReportReason, UploadKind, Visibility,
};

/// Feed page size when the client does not ask for one.
const FEED_PAGE_SIZE: u32 = 10;

pub(super) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(create_post)
                .layer(DefaultBodyLimit::max(UploadKind::Post.max_request_bytes())),
        )
        .route("/feed", get(feed))
        .route("/:id", get(get_post).delete(delete_post))
        .route("/:id/like", post(like_post))
        .route("/:id/comment", post(comment_on_post))
        .route("/:id/report", post(report_post))
}

/// Nudge an account's post counter, saturating at zero.
async fn adjust_posts_count(repo: &dyn Repository, id: &AccountId, delta: i64) {
    let result = modify::<Account, _, RepositoryError, _>(repo, id, |a| {
        let count = &mut a.social_stats.posts_count;
        *count = count.saturating_add_signed(delta);
        Ok(())
    })
    .await;
    if let Err(e) = result {
        warn!("Failed to update posts count for {}: {}", id, e);
    }
}

/// Best-effort notification; a failure never fails the request.
pub(super) async fn notify(repo: &dyn Repository, notification: Notification) {
    if let Err(e) = repo.insert_notification(&notification).await {
        warn!(
            "Failed to notify {} ({:?}): {}",
            notification.recipient, notification.kind, e
        );
    }
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = state
        .uploads
        .read_form(&user.id(), UploadKind::Post, multipart)
        .await?;

    let built = (|| {
        let mut post = Post::new(
            user.id(),
            user.role(),
            form.raw("content").unwrap_or_default(),
            Utc::now(),
        )?;
        post.hashtags = normalize_hashtags(parse_list(form.raw("hashtags").unwrap_or_default()));
        if let Some(visibility) = form.text("visibility") {
            post.visibility = visibility.parse::<Visibility>()?;
        }
        post.media = form.files.clone();
        Ok::<_, ApiError>(post)
    })();
    let post = discard_on_error(&state.uploads, &form.files, built).await?;

    let inserted = state.repository.insert_post(&post).await.map_err(ApiError::from);
    discard_on_error(&state.uploads, &form.files, inserted).await?;
    adjust_posts_count(state.repository.as_ref(), &user.id(), 1).await;
    info!("Post {} submitted for review by {}", post.id, user.id());

    let post = PostView::one(state.repository.as_ref(), post).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Post submitted for review",
            "post": post,
        })),
    ))
}

async fn feed(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Value>, ApiError> {
    let page = Page::new(params.page, params.limit, FEED_PAGE_SIZE);
    let (posts, total) = state.repository.list_feed(page).await?;
    let posts = PostView::many(state.repository.as_ref(), posts).await?;

    Ok(Json(json!({
        "success": true,
        "posts": posts,
        "totalPages": page.total_pages(total as usize),
        "currentPage": page.page,
        "totalPosts": total,
    })))
}

async fn get_post(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(viewer): OptionalAuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: PostId = parse_id(&id, "Post")?;
    let post = state
        .repository
        .get_post(&id)
        .await?
        .filter(|p| p.visible_to(viewer.as_ref().map(|u| (u.id(), u.role()))))
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let post = PostView::one(state.repository.as_ref(), post).await?;
    Ok(Json(json!({ "success": true, "post": post })))
}

/// Load a post the caller may see and apply `apply` to it.
async fn modify_visible_post<T, F>(
    repo: &dyn Repository,
    user: &AuthUser,
    id: &PostId,
    mut apply: F,
) -> Result<(Post, T), ApiError>
where
    T: Send,
    F: FnMut(&mut Post) -> Result<T, ApiError> + Send,
{
    let viewer = Some((user.id(), user.role()));
    modify::<Post, _, ApiError, _>(repo, id, |post| {
        if !post.visible_to(viewer) {
            return Err(ApiError::not_found("Post not found"));
        }
        apply(post)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Post not found"))
}

async fn like_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: PostId = parse_id(&id, "Post")?;
    let now = Utc::now();
    let (post, liked) = modify_visible_post(state.repository.as_ref(), &user, &id, |post| {
        Ok(post.toggle_like(user.id(), user.role(), now))
    })
    .await?;

    if liked && post.author != user.id() {
        let notification = Notification::new(
            post.author,
            NotificationKind::Like,
            "New like",
            format!("{} liked your post", user.0.user_info.full_name),
            now,
        )
        .with_account(user.id())
        .with_post(post.id);
        notify(state.repository.as_ref(), notification).await;
    }

    let likes: Vec<Like> = post.likes;
    Ok(Json(json!({
        "success": true,
        "liked": liked,
        "likesCount": likes.len(),
        "likes": likes,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct CommentRequest {
    text: Option<String>,
}

async fn comment_on_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id: PostId = parse_id(&id, "Post")?;
    let text = body.text.unwrap_or_default();
    let now = Utc::now();
    let (post, comment) = modify_visible_post(state.repository.as_ref(), &user, &id, |post| {
        Ok(post.add_comment(user.id(), user.role(), &text, now)?.clone())
    })
    .await?;

    if post.author != user.id() {
        let notification = Notification::new(
            post.author,
            NotificationKind::Comment,
            "New comment",
            format!("{} commented: {}", user.0.user_info.full_name, comment.text),
            now,
        )
        .with_account(user.id())
        .with_post(post.id);
        notify(state.repository.as_ref(), notification).await;
    }

    let comments: Vec<Comment> = post.comments;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "comment": comment,
            "comments": comments,
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct ReportRequest {
    reason: Option<String>,
    description: Option<String>,
}

async fn report_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReportRequest>,
) -> Result<Json<Value>, ApiError> {
    let id: PostId = parse_id(&id, "Post")?;
    let reason: ReportReason = body
        .reason
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .parse()?;
    let now = Utc::now();
    let (_, count) = modify_visible_post(state.repository.as_ref(), &user, &id, |post| {
        Ok(post.add_report(user.id(), reason, body.description.clone(), now)?)
    })
    .await?;

    info!("Post {} reported by {} ({})", id, user.id(), reason.as_str());
    Ok(Json(json!({
        "success": true,
        "message": "Post reported successfully",
        "reportsCount": count,
    })))
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: PostId = parse_id(&id, "Post")?;
    let post = state
        .repository
        .get_post(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    if post.author != user.id() {
        return Err(ApiError::forbidden("Not authorized"));
    }

    let Some(post) = state.repository.delete_post(&id).await? else {
        return Err(ApiError::not_found("Post not found"));
    };
    state
        .uploads
        .delete_all(post.media.into_iter().map(|m| m.url).collect())
        .await;
    adjust_posts_count(state.repository.as_ref(), &user.id(), -1).await;

    Ok(Json(json!({
        "success": true,
        "message": "Post deleted successfully",
    })))
}
