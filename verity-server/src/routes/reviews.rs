use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::parse_id;
use super::views::{summaries, PostView, ReviewView};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::moderation::submit_review;
use crate::AppState;
use verity_core::moderation::{ReviewDraft, Verdict};
use verity_core::{group_by_author, AccountSummary, PostId, ReviewerStats, Role, Source};

pub(super) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pending", get(pending_posts))
        .route("/submit", post(submit))
        .route("/stats", get(stats))
        .route("/history", get(history))
}

fn require_reviewer(user: &AuthUser) -> Result<(), ApiError> {
    user.require_role(&[Role::Reviewer])
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorGroup {
    author: Option<AccountSummary>,
    posts: Vec<PostView>,
    total_posts: usize,
}

async fn pending_posts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    require_reviewer(&user)?;

    let posts = state.repository.list_pending_posts(&user.id()).await?;
    let total_posts = posts.len();
    let authors = summaries(state.repository.as_ref(), posts.iter().map(|p| p.author)).await?;

    let grouped: Vec<AuthorGroup> = group_by_author(posts, |p| p.author)
        .into_iter()
        .map(|(author, posts)| AuthorGroup {
            author: authors.get(&author).cloned(),
            total_posts: posts.len(),
            posts: posts
                .into_iter()
                .map(|p| PostView::new(p, &authors))
                .collect(),
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "totalAuthors": grouped.len(),
        "totalPosts": total_posts,
        "groupedPosts": grouped,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    post_id: Option<String>,
    verdict: Option<String>,
    notes: Option<String>,
    confidence: Option<i64>,
    #[serde(default)]
    sources: Vec<Source>,
    #[serde(default)]
    tags: Vec<String>,
}

async fn submit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_role(&[Role::Reviewer])
        .map_err(|_| ApiError::forbidden("Only reviewers can submit reviews"))?;

    let (Some(post_id), Some(verdict), Some(confidence)) =
        (body.post_id, body.verdict, body.confidence)
    else {
        return Err(ApiError::bad_request(
            "Please provide postId, verdict, and confidence",
        ));
    };
    let post_id: PostId = parse_id(&post_id, "Post")?;
    let verdict: Verdict = verdict.trim().parse()?;
    let confidence = u32::try_from(confidence).map_err(|_| {
        ApiError::bad_request(format!(
            "Confidence must be between 0 and 100, got {}",
            confidence
        ))
    })?;

    let draft = ReviewDraft {
        verdict,
        confidence,
        notes: body.notes,
        sources: body.sources,
        tags: body.tags,
    };
    let decision = submit_review(
        state.repository.as_ref(),
        &post_id,
        user.id(),
        draft,
        Utc::now(),
    )
    .await?;

    let outcome = if verdict.approves() {
        "approved"
    } else {
        "rejected"
    };
    info!(
        "Reviewer {} {} post {} ({})",
        user.id(),
        outcome,
        post_id,
        verdict
    );

    let post = PostView::one(state.repository.as_ref(), decision.post).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": format!("Post {} successfully", outcome),
            "review": ReviewView::from(decision.review),
            "post": post,
        })),
    ))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    require_reviewer(&user)?;

    let reviews = state.repository.list_reviews_by_reviewer(&user.id()).await?;
    let pending = state.repository.list_pending_posts(&user.id()).await?.len() as u64;
    let stats = ReviewerStats::compute(&reviews, pending);

    Ok(Json(json!({ "success": true, "stats": stats })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    #[serde(flatten)]
    review: ReviewView,
    /// `None` once the post has been deleted.
    post: Option<PostView>,
}

async fn history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    require_reviewer(&user)?;

    let reviews = state.repository.list_reviews_by_reviewer(&user.id()).await?;
    let mut posts = Vec::new();
    for review in &reviews {
        if let Some(post) = state.repository.get_post(&review.post).await? {
            posts.push(post);
        }
    }
    let posts = PostView::many(state.repository.as_ref(), posts).await?;

    let entries: Vec<HistoryEntry> = reviews
        .into_iter()
        .map(|review| HistoryEntry {
            post: posts.iter().find(|p| p.id == review.post).cloned(),
            review: review.into(),
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "total": entries.len(),
        "reviews": entries,
    })))
}
