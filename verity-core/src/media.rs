//! Rules for user-supplied media: accepted types, per-surface limits and the
//! on-disk layout of uploaded files.

use serde::{Deserialize, Serialize};

const MB: u64 = 1024 * 1024;

/// File extensions accepted for any upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp", "mp4", "mov", "avi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify by MIME type. Anything that is not `image/*` counts as video,
    /// callers are expected to have run [`is_allowed_media`] first.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            MediaKind::Image
        } else {
            MediaKind::Video
        }
    }
}

/// Media attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub url: String,
}

/// Lowercased extension of `file_name`, without the dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// True when both the extension and the MIME type describe an image or video.
pub fn is_allowed_media(file_name: &str, mime: &str) -> bool {
    let ext_ok = file_extension(file_name)
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
    let mime = mime.to_ascii_lowercase();
    ext_ok && (mime.starts_with("image/") || mime.starts_with("video/"))
}

/// The surfaces that accept uploads, each with its own limits and directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Post,
    Profile,
    Story,
    Product,
}

impl UploadKind {
    /// Multipart field name carrying the files.
    pub fn field_name(&self) -> &'static str {
        match self {
            UploadKind::Post | UploadKind::Story => "media",
            UploadKind::Profile => "avatar",
            UploadKind::Product => "images",
        }
    }

    /// Subdirectory under the owner's upload directory.
    pub fn directory(&self) -> &'static str {
        match self {
            UploadKind::Post => "posts",
            UploadKind::Profile => "profile",
            UploadKind::Story => "stories",
            UploadKind::Product => "products",
        }
    }

    /// Stored file name prefix.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            UploadKind::Post => "media",
            UploadKind::Profile => "avatar",
            UploadKind::Story => "story",
            UploadKind::Product => "product",
        }
    }

    pub fn max_file_bytes(&self) -> u64 {
        match self {
            UploadKind::Post | UploadKind::Story => 50 * MB,
            UploadKind::Profile => 5 * MB,
            UploadKind::Product => 10 * MB,
        }
    }

    pub fn max_files(&self) -> usize {
        match self {
            UploadKind::Post => 10,
            UploadKind::Profile | UploadKind::Story => 1,
            UploadKind::Product => 5,
        }
    }

    /// Upper bound on the whole multipart body: all files at their limit plus
    /// one megabyte for the text fields.
    pub fn max_request_bytes(&self) -> usize {
        (self.max_file_bytes() * self.max_files() as u64 + MB) as usize
    }

    /// Public URL of a stored file.
    pub fn public_url(&self, owner: &str, file_name: &str) -> String {
        format!("/uploads/users/{}/{}/{}", owner, self.directory(), file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(file_extension("Holiday.JPG").as_deref(), Some("jpg"));
    }

    #[test]
    fn test_dotfiles_and_bare_names_have_no_extension() {
        assert_eq!(file_extension(".png"), None);
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("archive."), None);
    }

    #[test]
    fn test_allowed_media() {
        assert!(is_allowed_media("cat.png", "image/png"));
        assert!(is_allowed_media("clip.mov", "video/quicktime"));
        assert!(is_allowed_media("clip.avi", "video/x-msvideo"));
    }

    #[test]
    fn test_rejects_mismatched_or_unknown_types() {
        assert!(!is_allowed_media("notes.pdf", "application/pdf"));
        assert!(!is_allowed_media("cat.png", "application/octet-stream"));
        assert!(!is_allowed_media("script.sh", "image/png"));
    }

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/webp"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
    }

    #[test]
    fn test_product_limits() {
        let kind = UploadKind::Product;
        assert_eq!(kind.max_files(), 5);
        assert_eq!(kind.max_file_bytes(), 10 * MB);
        assert_eq!(
            kind.public_url("abc", "product-1.png"),
            "/uploads/users/abc/products/product-1.png"
        );
    }
}
