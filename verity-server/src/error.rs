use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;
use crate::repository::RepositoryError;
use crate::uploads::UploadError;
use verity_core::moderation::TransitionError;
use verity_core::{ParseError, PostError, ValidationError};

/// Every failure a handler can return.
///
/// Rendered as `{"success": false, "message": ...}`. Internal errors are
/// logged and replaced with a generic message.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "Server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Duplicate("email") => {
                ApiError::BadRequest("Email already exists".to_string())
            }
            RepositoryError::Duplicate(what) => ApiError::Conflict(format!("Duplicate {}", what)),
            RepositoryError::Conflict { .. } => ApiError::Conflict(
                "The record was changed by another request, please retry".to_string(),
            ),
            RepositoryError::NotFound { kind, .. } => {
                ApiError::NotFound(format!("{} not found", capitalize(kind)))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ParseError> for ApiError {
    fn from(e: ParseError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<PostError> for ApiError {
    fn from(e: PostError) -> Self {
        match e {
            PostError::Invalid(v) => v.into(),
            PostError::AlreadyReported => ApiError::Conflict(e.to_string()),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::SelfReview => ApiError::Forbidden(e.to_string()),
            TransitionError::AlreadyReviewed(_) => ApiError::Conflict(e.to_string()),
            TransitionError::InvalidConfidence(_) | TransitionError::NotesTooLong => {
                ApiError::BadRequest(e.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Hash(_) | AuthError::Token(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::TooLarge { .. } | UploadError::TooManyFiles { .. } => {
                ApiError::PayloadTooLarge(e.to_string())
            }
            UploadError::UnsupportedType { .. } => ApiError::BadRequest(e.to_string()),
            UploadError::Io(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        let status = e.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(e.body_text())
        } else {
            ApiError::BadRequest(e.body_text())
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_body_shape() {
        let (status, body) = render(ApiError::not_found("Post not found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"success": false, "message": "Post not found"}));
    }

    #[tokio::test]
    async fn test_internal_detail_is_hidden() {
        let (status, body) = render(ApiError::Internal("disk on fire".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Server error");
    }

    #[test]
    fn test_repository_mapping() {
        assert!(matches!(
            ApiError::from(RepositoryError::Duplicate("email")),
            ApiError::BadRequest(m) if m == "Email already exists"
        ));
        assert_eq!(
            ApiError::from(RepositoryError::not_found("post", "x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(RepositoryError::conflict("post", "x")).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_transition_mapping() {
        assert_eq!(
            ApiError::from(TransitionError::SelfReview).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(TransitionError::NotesTooLong).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
