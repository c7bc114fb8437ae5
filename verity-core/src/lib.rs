pub mod account;
pub mod ids;
pub mod media;
pub mod moderation;
pub mod name;
pub mod paging;
pub mod post;
pub mod product;
pub mod review;
pub mod role;
pub mod social;
pub mod story;
pub mod validate;

pub use account::*;
pub use ids::*;
pub use media::*;
pub use moderation::{ModerationState, Verdict, VerificationStatus};
pub use name::{clean_full_name, split_full_name};
pub use paging::Page;
pub use post::*;
pub use product::*;
pub use review::*;
pub use role::{ParseError, Role};
pub use social::*;
pub use story::*;
pub use validate::{check_optional_text, check_text, ValidationError};

/// Maximum length of a post body.
pub const POST_CONTENT_MAX_LEN: usize = 500;

/// Maximum length of a comment on a post.
pub const COMMENT_MAX_LEN: usize = 200;

/// Maximum length of a profile bio.
pub const BIO_MAX_LEN: usize = 150;

/// Maximum length of a story caption.
pub const CAPTION_MAX_LEN: usize = 200;

/// Maximum length of reviewer notes and direct messages.
pub const NOTES_MAX_LEN: usize = 1000;

/// Minimum accepted password length.
pub const PASSWORD_MIN_LEN: usize = 6;

/// Character count, not byte count: limits are user-facing.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}
