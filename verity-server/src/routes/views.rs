//! Response shapes.
//!
//! Stored records are never serialised to clients directly: accounts carry
//! their password hash, and posts, stories and products are returned with
//! their author resolved to a summary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::repository::{Repository, RepositoryError};
use verity_core::moderation::{VerificationStatus, Verdict};
use verity_core::{
    Account, AccountId, AccountSummary, Activity, BusinessDetails, Comment, Inquiry, Like,
    MediaItem, MediaKind, Post, PostId, ProductCategory, ProductId, ProductImage, ProductLike,
    Product, ProfileInfo, Review, ReviewId, ReviewerCounters, Role, SocialStats, Source, Story,
    StoryId, Trust, UserInfo, Visibility,
};

/// Resolve account ids to summaries. Unknown ids are left out.
pub async fn summaries(
    repo: &dyn Repository,
    ids: impl IntoIterator<Item = AccountId>,
) -> Result<HashMap<AccountId, AccountSummary>, RepositoryError> {
    let mut wanted: Vec<AccountId> = ids.into_iter().collect();
    wanted.sort();
    wanted.dedup();
    let accounts = repo.get_accounts(&wanted).await?;
    Ok(accounts.into_iter().map(|a| (a.id, a.summary())).collect())
}

/// An account as its owner and other signed-in users see it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: AccountId,
    pub email: String,
    pub role: Role,
    pub full_name: String,
    pub avatar: Option<String>,
    pub user_info: UserInfo,
    pub profile_info: ProfileInfo,
    pub social_stats: SocialStats,
    pub trust: Trust,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_stats: Option<ReviewerCounters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_details: Option<BusinessDetails>,
    pub activity: Activity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for ProfileView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            role: account.role,
            full_name: account.user_info.full_name.clone(),
            avatar: account.profile_info.avatar.clone(),
            user_info: account.user_info,
            profile_info: account.profile_info,
            social_stats: account.social_stats,
            trust: account.trust,
            reviewer_stats: account.reviewer_stats,
            business_details: account.business_details,
            activity: account.activity,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: PostId,
    pub author: Option<AccountSummary>,
    pub author_role: Role,
    pub content: String,
    pub media: Vec<MediaItem>,
    pub hashtags: Vec<String>,
    pub visibility: Visibility,
    pub verification_status: VerificationStatus,
    pub is_verified: bool,
    pub reviewed_by: Option<AccountId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub likes: Vec<Like>,
    pub likes_count: usize,
    pub comments: Vec<Comment>,
    pub comments_count: usize,
    pub reports_count: usize,
    pub created_at: DateTime<Utc>,
}

impl PostView {
    pub fn new(post: Post, authors: &HashMap<AccountId, AccountSummary>) -> Self {
        Self {
            id: post.id,
            author: authors.get(&post.author).cloned(),
            author_role: post.author_role,
            verification_status: post.status(),
            is_verified: post.moderation.is_verified(),
            reviewed_by: post.moderation.reviewed_by(),
            reviewed_at: post.moderation.reviewed_at(),
            review_notes: post.moderation.notes().map(str::to_string),
            likes_count: post.likes.len(),
            comments_count: post.comments.len(),
            reports_count: post.reports.len(),
            content: post.content,
            media: post.media,
            hashtags: post.hashtags,
            visibility: post.visibility,
            likes: post.likes,
            comments: post.comments,
            created_at: post.created_at,
        }
    }

    /// Views for a list of posts, resolving all authors in one lookup.
    pub async fn many(repo: &dyn Repository, posts: Vec<Post>) -> Result<Vec<Self>, RepositoryError> {
        let authors = summaries(repo, posts.iter().map(|p| p.author)).await?;
        Ok(posts
            .into_iter()
            .map(|p| PostView::new(p, &authors))
            .collect())
    }

    pub async fn one(repo: &dyn Repository, post: Post) -> Result<Self, RepositoryError> {
        let authors = summaries(repo, [post.author]).await?;
        Ok(PostView::new(post, &authors))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryEntry {
    pub id: StoryId,
    pub author: Option<AccountSummary>,
    pub media_url: String,
    pub media_type: MediaKind,
    pub caption: String,
    pub view_count: u64,
    pub has_viewed: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StoryEntry {
    pub fn new(
        story: Story,
        viewer: &AccountId,
        authors: &HashMap<AccountId, AccountSummary>,
    ) -> Self {
        Self {
            id: story.id,
            author: authors.get(&story.author).cloned(),
            has_viewed: story.has_viewed(viewer),
            media_url: story.media_url,
            media_type: story.media_kind,
            caption: story.caption,
            view_count: story.view_count,
            expires_at: story.expires_at,
            created_at: story.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: ProductId,
    pub business: Option<AccountSummary>,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub images: Vec<ProductImage>,
    pub category: ProductCategory,
    pub tags: Vec<String>,
    pub stock: u64,
    pub in_stock: bool,
    pub views: u64,
    pub likes: Vec<ProductLike>,
    pub likes_count: usize,
    /// Only shown to the owning business.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inquiries: Option<Vec<Inquiry>>,
    pub inquiries_count: usize,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

impl ProductView {
    pub fn new(
        product: Product,
        viewer: Option<&AccountId>,
        businesses: &HashMap<AccountId, AccountSummary>,
    ) -> Self {
        let is_owner = viewer == Some(&product.business);
        Self {
            id: product.id,
            business: businesses.get(&product.business).cloned(),
            likes_count: product.likes.len(),
            inquiries_count: product.inquiries.len(),
            inquiries: is_owner.then_some(product.inquiries),
            name: product.name,
            description: product.description,
            price: product.price,
            currency: product.currency,
            images: product.images,
            category: product.category,
            tags: product.tags,
            stock: product.stock,
            in_stock: product.in_stock,
            views: product.views,
            likes: product.likes,
            is_active: product.is_active,
            is_featured: product.is_featured,
            created_at: product.created_at,
        }
    }

    pub async fn many(
        repo: &dyn Repository,
        products: Vec<Product>,
        viewer: Option<&AccountId>,
    ) -> Result<Vec<Self>, RepositoryError> {
        let businesses = summaries(repo, products.iter().map(|p| p.business)).await?;
        Ok(products
            .into_iter()
            .map(|p| ProductView::new(p, viewer, &businesses))
            .collect())
    }

    pub async fn one(
        repo: &dyn Repository,
        product: Product,
        viewer: Option<&AccountId>,
    ) -> Result<Self, RepositoryError> {
        let businesses = summaries(repo, [product.business]).await?;
        Ok(ProductView::new(product, viewer, &businesses))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: ReviewId,
    pub post_id: PostId,
    pub reviewer: AccountId,
    pub verdict: Verdict,
    pub notes: Option<String>,
    pub confidence: u8,
    pub sources: Vec<Source>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            post_id: review.post,
            reviewer: review.reviewer,
            verdict: review.verdict,
            notes: review.notes,
            confidence: review.confidence,
            sources: review.sources,
            tags: review.tags,
            created_at: review.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    #[tokio::test]
    async fn test_profile_never_exposes_password_hash() {
        let account = Account::new("a@example.com", "$argon2id$secret".into(), Role::Business, "Ann Lee", Utc::now());
        let value = serde_json::to_value(ProfileView::from(account)).unwrap();
        assert!(!value.to_string().contains("argon2id"));
        assert_eq!(value["fullName"], "Ann Lee");
        assert_eq!(value["businessDetails"]["businessType"], "General");
        assert!(value.get("reviewerStats").is_none());
    }

    #[tokio::test]
    async fn test_post_view_resolves_author() {
        let repo = InMemoryRepository::new();
        let account = Account::new("a@example.com", String::new(), Role::User, "Ann Lee", Utc::now());
        repo.insert_account(&account).await.unwrap();
        let post = Post::new(account.id, Role::User, "hello", Utc::now()).unwrap();

        let value = serde_json::to_value(PostView::one(&repo, post).await.unwrap()).unwrap();
        assert_eq!(value["author"]["fullName"], "Ann Lee");
        assert_eq!(value["verificationStatus"], "pending");
        assert_eq!(value["isVerified"], false);
        assert_eq!(value["likesCount"], 0);
    }

    #[tokio::test]
    async fn test_inquiries_only_for_owner() {
        let repo = InMemoryRepository::new();
        let business = AccountId::new();
        let product = Product::new(
            business,
            verity_core::NewProduct {
                name: "Lamp".into(),
                description: "Bright".into(),
                price: 10.0,
                category: ProductCategory::Home,
                tags: vec![],
                stock: 1,
            },
            Utc::now(),
        )
        .unwrap();

        let owner = ProductView::one(&repo, product.clone(), Some(&business)).await.unwrap();
        assert!(owner.inquiries.is_some());
        let stranger = ProductView::one(&repo, product, Some(&AccountId::new())).await.unwrap();
        assert!(stranger.inquiries.is_none());
    }
}
