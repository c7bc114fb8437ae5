pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod moderation;
pub mod repository;
pub mod routes;
pub mod status;
pub mod sweeper;
pub mod uploads;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use auth::TokenService;
use repository::Repository;
use uploads::UploadStore;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn get_server_version() -> String {
    // Packagers may pin the hash at build time
    if let Some(git_hash) = option_env!("VERITY_GIT_HASH") {
        short_hash(git_hash)
    } else if let Some(git_hash) = built_info::GIT_COMMIT_HASH {
        short_hash(git_hash)
    } else {
        built_info::PKG_VERSION.to_string()
    }
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(8).collect()
}

pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub tokens: TokenService,
    pub uploads: UploadStore,
    pub status_auth_token: Option<String>,
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Verity API Server Running",
        "version": get_server_version(),
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "verity"
    }))
}

/// The complete application: ops endpoints, `/api`, and uploaded media.
pub fn build_router(state: Arc<AppState>) -> Router {
    let media = ServeDir::new(state.uploads.root());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/status", get(status::status_handler))
        .nest("/api", routes::api_router())
        .nest_service("/uploads", media)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
