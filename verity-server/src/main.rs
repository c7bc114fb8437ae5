use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use verity_server::auth::TokenService;
use verity_server::config::{Config, StorageBackend};
use verity_server::repository::{InMemoryRepository, Repository, SqliteRepository};
use verity_server::sweeper::story_sweep_loop;
use verity_server::uploads::UploadStore;
use verity_server::{build_router, get_server_version, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Verity API server {}", get_server_version());

    let config = Config::from_env().context("Failed to load configuration from environment")?;
    info!("Configuration: {:?}", config);

    let repository: Arc<dyn Repository> = match config.storage_backend {
        StorageBackend::Sqlite => {
            let db_path = config.database_path();
            info!("Using state database: {}", db_path.display());
            Arc::new(
                SqliteRepository::new(&db_path)
                    .with_context(|| format!("Failed to open {}", db_path.display()))?,
            )
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; nothing will survive a restart");
            Arc::new(InMemoryRepository::new())
        }
    };

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;
    let uploads = UploadStore::new(&config.upload_dir);

    let state = Arc::new(AppState {
        repository: repository.clone(),
        tokens: TokenService::new(&config.jwt_secret, config.token_ttl),
        uploads: uploads.clone(),
        status_auth_token: config.status_auth_token.clone(),
    });

    tokio::spawn(story_sweep_loop(
        repository,
        uploads,
        config.story_sweep_interval,
    ));

    let app = build_router(state);
    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
