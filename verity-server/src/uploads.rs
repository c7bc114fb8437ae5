//! Local-disk media store.
//!
//! Files land under `<root>/users/<account>/<dir>/` and are addressed by the
//! public URL `/uploads/users/<account>/<dir>/<file>`, which the router serves
//! straight from `root`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use verity_core::{file_extension, is_allowed_media, AccountId, MediaItem, MediaKind, UploadKind};

/// URL prefix the upload root is mounted at.
pub const PUBLIC_PREFIX: &str = "/uploads/";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File {file} is larger than {max_bytes} bytes")]
    TooLarge { file: String, max_bytes: u64 },

    #[error("At most {max} files can be uploaded")]
    TooManyFiles { max: usize },

    #[error("Only image and video files are allowed ({file})")]
    UnsupportedType { file: String },

    #[error("upload io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A text-and-files multipart form whose files are already on disk.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<MediaItem>,
}

impl UploadForm {
    /// A text field, trimmed; `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// A text field as given, `None` only when absent.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner: &AccountId) -> PathBuf {
        self.root.join("users").join(owner.to_string())
    }

    /// Read every part of `multipart`, storing files sent under the field
    /// `kind` expects. Files written before a failure are removed again.
    pub async fn read_form(
        &self,
        owner: &AccountId,
        kind: UploadKind,
        mut multipart: Multipart,
    ) -> Result<UploadForm, ApiError> {
        let mut form = UploadForm::default();
        let result = async {
            while let Some(field) = multipart.next_field().await? {
                let name = field.name().unwrap_or_default().to_string();
                match field.file_name().map(str::to_string) {
                    None => {
                        let value = field.text().await?;
                        form.fields.insert(name, value);
                    }
                    Some(file_name) if file_name.is_empty() => continue,
                    Some(file_name) => {
                        if name != kind.field_name() {
                            return Err(ApiError::bad_request(format!(
                                "Unexpected file field {}",
                                name
                            )));
                        }
                        if form.files.len() >= kind.max_files() {
                            return Err(UploadError::TooManyFiles {
                                max: kind.max_files(),
                            }
                            .into());
                        }
                        let item = self.save_field(owner, kind, &file_name, field).await?;
                        form.files.push(item);
                    }
                }
            }
            Ok::<(), ApiError>(())
        }
        .await;

        match result {
            Ok(()) => Ok(form),
            Err(e) => {
                self.delete_all(form.files.into_iter().map(|m| m.url).collect())
                    .await;
                Err(e)
            }
        }
    }

    async fn save_field(
        &self,
        owner: &AccountId,
        kind: UploadKind,
        file_name: &str,
        mut field: Field<'_>,
    ) -> Result<MediaItem, ApiError> {
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !is_allowed_media(file_name, &mime) {
            return Err(UploadError::UnsupportedType {
                file: file_name.to_string(),
            }
            .into());
        }
        // is_allowed_media already required an extension
        let ext = file_extension(file_name).unwrap_or_default();

        let stored_name = format!(
            "{}-{}-{}.{}",
            kind.file_prefix(),
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            ext
        );
        let dir = self.owner_dir(owner).join(kind.directory());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(UploadError::Io)?;
        let path = dir.join(&stored_name);

        let written = async {
            let mut file = tokio::fs::File::create(&path)
                .await
                .map_err(UploadError::Io)?;
            let mut size: u64 = 0;
            while let Some(chunk) = field.chunk().await? {
                size += chunk.len() as u64;
                if size > kind.max_file_bytes() {
                    return Err(UploadError::TooLarge {
                        file: file_name.to_string(),
                        max_bytes: kind.max_file_bytes(),
                    }
                    .into());
                }
                file.write_all(&chunk).await.map_err(UploadError::Io)?;
            }
            file.flush().await.map_err(UploadError::Io)?;
            Ok::<_, ApiError>(size)
        }
        .await;

        match written {
            Ok(size) => {
                debug!("Stored {} ({} bytes) at {}", file_name, size, path.display());
                Ok(MediaItem {
                    kind: MediaKind::from_mime(&mime),
                    url: kind.public_url(&owner.to_string(), &stored_name),
                })
            }
            Err(e) => {
                remove_quietly(&path).await;
                Err(e)
            }
        }
    }

    /// Map a public URL back onto the upload root. `None` for anything
    /// outside it.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let relative = Path::new(url.strip_prefix(PUBLIC_PREFIX)?);
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Delete the file behind a public URL. Missing files are fine.
    pub async fn delete_url(&self, url: &str) {
        match self.path_for_url(url) {
            Some(path) => remove_quietly(&path).await,
            None => debug!("Not deleting {}: outside the upload root", url),
        }
    }

    /// Delete the files behind each URL.
    pub async fn delete_all(&self, urls: Vec<String>) {
        for url in &urls {
            self.delete_url(url).await;
        }
    }

    /// Remove everything an account ever uploaded.
    pub async fn remove_owner_dir(&self, owner: &AccountId) {
        let dir = self.owner_dir(owner);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!("Removed upload directory {}", dir.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
        }
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    const BOUNDARY: &str = "verity-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a str, &'a [u8]),
    }

    async fn multipart(parts: &[Part<'_>]) -> Multipart {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, mime, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            name, file_name, mime
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_reads_fields_and_stores_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let owner = AccountId::new();

        let form = store
            .read_form(
                &owner,
                UploadKind::Post,
                multipart(&[
                    Part::Text("content", "hello"),
                    Part::File("media", "cat.PNG", "image/png", b"png-bytes"),
                ])
                .await,
            )
            .await
            .unwrap();

        assert_eq!(form.text("content"), Some("hello"));
        assert_eq!(form.files.len(), 1);
        let item = &form.files[0];
        assert_eq!(item.kind, MediaKind::Image);
        let prefix = format!("/uploads/users/{}/posts/media-", owner);
        assert!(item.url.starts_with(&prefix), "{}", item.url);
        assert!(item.url.ends_with(".png"));

        let path = store.path_for_url(&item.url).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");

        store.delete_url(&item.url).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rejects_unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let err = store
            .read_form(
                &AccountId::new(),
                UploadKind::Post,
                multipart(&[Part::File("media", "doc.pdf", "application/pdf", b"%PDF")]).await,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_too_many_files_removes_saved_ones() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let owner = AccountId::new();
        let err = store
            .read_form(
                &owner,
                UploadKind::Story,
                multipart(&[
                    Part::File("media", "a.png", "image/png", b"a"),
                    Part::File("media", "b.png", "image/png", b"b"),
                ])
                .await,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));

        let stories = dir
            .path()
            .join("users")
            .join(owner.to_string())
            .join("stories");
        assert_eq!(std::fs::read_dir(stories).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unexpected_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let err = store
            .read_form(
                &AccountId::new(),
                UploadKind::Profile,
                multipart(&[Part::File("media", "a.png", "image/png", b"a")]).await,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m.contains("media")));
    }

    #[test]
    fn test_path_for_url_stays_inside_root() {
        let store = UploadStore::new("/srv/uploads");
        assert_eq!(
            store.path_for_url("/uploads/users/a/posts/x.png"),
            Some(PathBuf::from("/srv/uploads/users/a/posts/x.png"))
        );
        assert_eq!(store.path_for_url("/uploads/../etc/passwd"), None);
        assert_eq!(store.path_for_url("/uploads//etc/passwd"), None);
        assert_eq!(store.path_for_url("/uploads/"), None);
        assert_eq!(store.path_for_url("https://cdn.example.com/x.png"), None);
    }

    #[tokio::test]
    async fn test_remove_owner_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let owner = AccountId::new();
        let form = store
            .read_form(
                &owner,
                UploadKind::Profile,
                multipart(&[Part::File("avatar", "me.jpg", "image/jpeg", b"jpg")]).await,
            )
            .await
            .unwrap();
        assert_eq!(form.files.len(), 1);

        store.remove_owner_dir(&owner).await;
        assert!(!dir.path().join("users").join(owner.to_string()).exists());
        // second removal is a no-op
        store.remove_owner_dir(&owner).await;
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_delete_all_removes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let form = store
            .read_form(
                &AccountId::new(),
                UploadKind::Post,
                multipart(&[
                    Part::File("media", "a.png", "image/png", b"a"),
                    Part::File("media", "b.mp4", "video/mp4", b"b"),
                ])
                .await,
            )
            .await
            .unwrap();
        let paths: Vec<_> = form
            .files
            .iter()
            .map(|m| store.path_for_url(&m.url).unwrap())
            .collect();
        assert!(paths.iter().all(|p| p.exists()));

        let deleting = store.delete_all(form.files.iter().map(|m| m.url.clone()).collect());
        assert_send(&deleting);
        deleting.await;
        assert!(paths.iter().all(|p| !p.exists()));
    }
}
