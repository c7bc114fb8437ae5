use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::views::ProfileView;
use crate::auth::{hash_password, verify_password, AuthUser, OptionalAuthUser};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::repository::{modify, RepositoryError};
use crate::AppState;
use verity_core::{check_email, normalize_email, Account, Role, PASSWORD_MIN_LEN};

pub(super) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/test", get(test_auth))
        .route("/test-protected", get(test_protected))
        .route("/signup", post(signup))
        .route("/login", post(login))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    full_name: Option<String>,
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_role(raw: Option<String>) -> Result<Option<Role>, ApiError> {
    match present(raw) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<Role>().map(Some).map_err(|_| {
            ApiError::bad_request("Invalid role. Must be User, Reviewer, or Business")
        }),
    }
}

async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = present(body.full_name).or(present(body.name));
    let (Some(full_name), Some(email), Some(password)) =
        (full_name, present(body.email), body.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::bad_request(
            "Please provide fullName (or name), email, and password",
        ));
    };

    let role = parse_role(body.role)?.unwrap_or(Role::User);
    let email = check_email(&email)?;
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }

    if state.repository.find_account_by_email(&email).await?.is_some() {
        return Err(ApiError::bad_request("Email already exists"));
    }

    let password_hash = hash_password(password).await?;
    let mut account = Account::new(&email, password_hash, role, &full_name, Utc::now());
    if role == Role::Business {
        account.user_info.business_name = Some(account.user_info.full_name.clone());
    }
    state.repository.insert_account(&account).await?;

    let token = state.tokens.issue(&account)?;
    info!("Registered {} account {}", role, account.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "token": token,
            "user": ProfileView::from(account),
        })),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(email), Some(password)) = (present(body.email), body.password) else {
        return Err(ApiError::bad_request("Please provide email and password"));
    };
    let requested_role = parse_role(body.role)?;

    let account = state
        .repository
        .find_account_by_email(&normalize_email(&email))
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized("No account found with this email address".to_string())
        })?;

    if let Some(requested) = requested_role {
        if requested != account.role {
            return Err(ApiError::Unauthorized(format!(
                "This email is registered as a {0} account. Please select {0} to login.",
                account.role
            )));
        }
    }

    if !verify_password(password, account.password_hash.clone()).await? {
        return Err(ApiError::Unauthorized(
            "Incorrect password. Please try again.".to_string(),
        ));
    }
    if !account.trust.is_active {
        return Err(ApiError::Unauthorized("Account is deactivated".to_string()));
    }

    let now = Utc::now();
    let (account, ()) = modify::<Account, _, RepositoryError, _>(
        state.repository.as_ref(),
        &account.id,
        |a| {
            a.record_login(now);
            Ok(())
        },
    )
    .await?
    .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    let token = state.tokens.issue(&account)?;
    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": ProfileView::from(account),
    })))
}

async fn test_auth(OptionalAuthUser(user): OptionalAuthUser) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Auth API is working!",
        "timestamp": Utc::now(),
        "user": user.map(|u| json!({ "id": u.id(), "role": u.role() })),
    }))
}

async fn test_protected(user: AuthUser) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Protected route is working!",
        "timestamp": Utc::now(),
        "user": { "id": user.id(), "role": user.role() },
    }))
}
