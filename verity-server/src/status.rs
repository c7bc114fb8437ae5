//! Operator status endpoint.
//!
//! Disabled unless `STATUS_AUTH_TOKEN` is configured; callers must then send
//! it as a bearer token.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::repository::StorageCounts;
use crate::{get_server_version, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub counts: StorageCounts,
}

/// Check the request against the configured status token.
pub fn validate_status_auth(
    headers: &HeaderMap,
    auth_token: &Option<String>,
) -> Result<(), ApiError> {
    let Some(expected_token) = auth_token else {
        return Err(ApiError::forbidden(
            "Status endpoint is disabled (STATUS_AUTH_TOKEN not configured)",
        ));
    };

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(value) if value.starts_with("Bearer ") => {
            if &value[7..] == expected_token {
                Ok(())
            } else {
                Err(ApiError::Unauthorized("Invalid token".to_string()))
            }
        }
        Some(_) => Err(ApiError::Unauthorized(
            "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
        )),
        None => Err(ApiError::Unauthorized(
            "Missing Authorization header".to_string(),
        )),
    }
}

pub async fn status_handler(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusData>, ApiError> {
    validate_status_auth(&headers, &state.status_auth_token)?;

    let now = Utc::now();
    let counts = state.repository.counts(now).await?;
    Ok(Json(StatusData {
        version: get_server_version(),
        generated_at: now,
        counts,
    }))
}
