//! Background removal of expired stories.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::repository::{Repository, RepositoryError};
use crate::uploads::UploadStore;

/// Purge expired stories every `period`, forever.
pub async fn story_sweep_loop(
    repository: Arc<dyn Repository>,
    uploads: UploadStore,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if let Err(e) = sweep_expired_stories(repository.as_ref(), &uploads, Utc::now()).await {
            error!("Error sweeping expired stories: {}", e);
        }
    }
}

/// Delete stories that expired at or before `now`, along with their media.
/// Returns how many were removed.
pub async fn sweep_expired_stories(
    repository: &dyn Repository,
    uploads: &UploadStore,
    now: DateTime<Utc>,
) -> Result<usize, RepositoryError> {
    let expired = repository.purge_expired_stories(now).await?;
    if expired.is_empty() {
        return Ok(0);
    }

    let count = expired.len();
    uploads
        .delete_all(expired.into_iter().map(|s| s.media_url).collect())
        .await;
    info!("Purged {} expired stories", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use chrono::Duration as ChronoDuration;
    use verity_core::{AccountId, MediaKind, Role, Story};

    #[tokio::test]
    async fn test_sweep_removes_record_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadStore::new(dir.path());
        let repo = InMemoryRepository::new();
        let author = AccountId::new();

        let created = Utc::now() - ChronoDuration::hours(25);
        let url = format!("/uploads/users/{}/stories/story-1-a.png", author);
        let path = uploads.path_for_url(&url).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"img").unwrap();

        let expired = Story::new(author, Role::User, url, MediaKind::Image, String::new(), created);
        let fresh = Story::new(
            author,
            Role::User,
            "/uploads/users/x/stories/story-2-b.png".to_string(),
            MediaKind::Image,
            String::new(),
            Utc::now(),
        );
        repo.insert_story(&expired).await.unwrap();
        repo.insert_story(&fresh).await.unwrap();

        let removed = sweep_expired_stories(&repo, &uploads, Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!path.exists());
        assert!(repo.get_story(&expired.id).await.unwrap().is_none());
        assert!(repo.get_story(&fresh.id).await.unwrap().is_some());

        assert_eq!(
            sweep_expired_stories(&repo, &uploads, Utc::now()).await.unwrap(),
            0
        );
    }
}
