use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::posts::notify;
use super::views::{summaries, ProfileView};
use super::{discard_on_error, parse_id};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ApiMultipart;
use crate::repository::{modify, Repository, RepositoryError};
use crate::AppState;
use verity_core::{
    check_optional_text, Account, AccountId, AccountSummary, Connection, Notification,
    NotificationKind, UploadKind, BIO_MAX_LEN,
};

/// Longest accepted website link.
const WEBSITE_MAX_LEN: usize = 200;

pub(super) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/profiles",
            get(own_profile).put(update_profile).layer(DefaultBodyLimit::max(
                UploadKind::Profile.max_request_bytes(),
            )),
        )
        .route("/profiles/:user_id", get(profile).delete(delete_account))
        .route("/:user_id/follow", post(follow).delete(unfollow))
        .route("/:user_id/followers", get(followers))
        .route("/:user_id/following", get(following))
}

async fn load_account(repo: &dyn Repository, raw_id: &str) -> Result<Account, ApiError> {
    let id: AccountId = parse_id(raw_id, "User")?;
    repo.get_account(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn own_profile(user: AuthUser) -> Json<Value> {
    Json(json!({ "success": true, "user": ProfileView::from(user.0) }))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let account = load_account(state.repository.as_ref(), &user_id).await?;
    Ok(Json(json!({ "success": true, "user": ProfileView::from(account) })))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<Json<Value>, ApiError> {
    let form = state
        .uploads
        .read_form(&user.id(), UploadKind::Profile, multipart)
        .await?;

    let checked = (|| {
        let bio = form
            .raw("bio")
            .map(|b| check_optional_text("bio", b, BIO_MAX_LEN))
            .transpose()?;
        let website = form
            .raw("website")
            .map(|w| check_optional_text("website", w, WEBSITE_MAX_LEN))
            .transpose()?;
        Ok::<_, ApiError>((bio, website))
    })();
    let (bio, website) = discard_on_error(&state.uploads, &form.files, checked).await?;

    let new_avatar = form.files.first().map(|m| m.url.clone());
    let now = Utc::now();
    let updated = modify::<Account, _, RepositoryError, _>(
        state.repository.as_ref(),
        &user.id(),
        |account| {
            account.rename(form.text("firstName"), form.text("lastName"));
            if let Some(bio) = &bio {
                account.profile_info.bio = bio.clone();
            }
            if let Some(website) = &website {
                account.profile_info.website = website.clone();
            }
            let previous = match &new_avatar {
                Some(url) => account.profile_info.avatar.replace(url.clone()),
                None => None,
            };
            account.updated_at = now;
            Ok(previous)
        },
    )
    .await
    .map_err(ApiError::from)
    .and_then(|found| found.ok_or_else(|| ApiError::not_found("User not found")));
    let (account, previous_avatar) = discard_on_error(&state.uploads, &form.files, updated).await?;

    if let Some(previous) = previous_avatar {
        state.uploads.delete_url(&previous).await;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": ProfileView::from(account),
    })))
}

async fn delete_account(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: AccountId = parse_id(&user_id, "User")?;
    if id != user.id() {
        return Err(ApiError::forbidden("You can only delete your own account"));
    }
    let repo = state.repository.as_ref();

    let posts = repo.delete_posts_by_author(&id).await?;
    let stories = repo.delete_stories_by_author(&id).await?;
    let products = repo.delete_products_by_business(&id).await?;
    let connections = repo.delete_connections_of(&id).await?;

    for connection in &connections {
        if connection.follower == id {
            adjust_follow_counts(repo, None, Some(&connection.following), -1).await;
        } else {
            adjust_follow_counts(repo, Some(&connection.follower), None, -1).await;
        }
    }

    if repo.delete_account(&id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    state.uploads.remove_owner_dir(&id).await;

    info!(
        "Deleted account {} with {} posts, {} stories, {} products, {} connections",
        id,
        posts.len(),
        stories.len(),
        products.len(),
        connections.len()
    );
    Ok(Json(json!({
        "success": true,
        "message": "Account deleted successfully",
        "deleted": {
            "posts": posts.len(),
            "stories": stories.len(),
            "products": products.len(),
            "connections": connections.len(),
        },
    })))
}

/// Shift `following_count` on the follower and `followers_count` on the
/// followee by `delta`.
async fn adjust_follow_counts(
    repo: &dyn Repository,
    follower: Option<&AccountId>,
    followee: Option<&AccountId>,
    delta: i64,
) {
    if let Some(id) = follower {
        let result = modify::<Account, _, RepositoryError, _>(repo, id, |a| {
            let count = &mut a.social_stats.following_count;
            *count = count.saturating_add_signed(delta);
            Ok(())
        })
        .await;
        if let Err(e) = result {
            warn!("Failed to update following count for {}: {}", id, e);
        }
    }
    if let Some(id) = followee {
        let result = modify::<Account, _, RepositoryError, _>(repo, id, |a| {
            let count = &mut a.social_stats.followers_count;
            *count = count.saturating_add_signed(delta);
            Ok(())
        })
        .await;
        if let Err(e) = result {
            warn!("Failed to update followers count for {}: {}", id, e);
        }
    }
}

async fn follow(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state.repository.as_ref();
    let target = load_account(repo, &user_id).await?;
    if target.id == user.id() {
        return Err(ApiError::bad_request("You cannot follow yourself"));
    }

    let now = Utc::now();
    let connection = Connection {
        follower: user.id(),
        following: target.id,
        created_at: now,
    };
    match repo.insert_connection(&connection).await {
        Ok(()) => {}
        Err(RepositoryError::Duplicate(_)) => {
            return Err(ApiError::Conflict(
                "You are already following this user".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    }
    adjust_follow_counts(repo, Some(&user.id()), Some(&target.id), 1).await;

    let notification = Notification::new(
        target.id,
        NotificationKind::Follow,
        "New follower",
        format!("{} started following you", user.0.user_info.full_name),
        now,
    )
    .with_account(user.id());
    notify(repo, notification).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "User followed successfully" })),
    ))
}

async fn unfollow(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let repo = state.repository.as_ref();
    let target: AccountId = parse_id(&user_id, "User")?;
    if !repo.delete_connection(&user.id(), &target).await? {
        return Err(ApiError::not_found("You are not following this user"));
    }
    adjust_follow_counts(repo, Some(&user.id()), Some(&target), -1).await;

    Ok(Json(
        json!({ "success": true, "message": "User unfollowed successfully" }),
    ))
}

async fn ordered_summaries(
    repo: &dyn Repository,
    ids: Vec<AccountId>,
) -> Result<Vec<AccountSummary>, RepositoryError> {
    let found = summaries(repo, ids.iter().copied()).await?;
    Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
}

async fn followers(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let repo = state.repository.as_ref();
    let account = load_account(repo, &user_id).await?;
    let ids = repo
        .list_followers(&account.id)
        .await?
        .into_iter()
        .map(|c| c.follower)
        .collect();
    let followers = ordered_summaries(repo, ids).await?;
    Ok(Json(json!({
        "success": true,
        "count": followers.len(),
        "followers": followers,
    })))
}

async fn following(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let repo = state.repository.as_ref();
    let account = load_account(repo, &user_id).await?;
    let ids = repo
        .list_following(&account.id)
        .await?
        .into_iter()
        .map(|c| c.following)
        .collect();
    let following = ordered_summaries(repo, ids).await?;
    Ok(Json(json!({
        "success": true,
        "count": following.len(),
        "following": following,
    })))
}
