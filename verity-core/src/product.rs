//! Marketplace listings owned by business accounts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, ProductId};
use crate::role::{ParseError, Role};
use crate::validate::{check_text, ValidationError};
use crate::NOTES_MAX_LEN;

pub const PRODUCT_NAME_MAX_LEN: usize = 100;
pub const PRODUCT_DESCRIPTION_MAX_LEN: usize = 1000;
pub const DEFAULT_CURRENCY: &str = "USD";

macro_rules! categories {
    ($($variant:ident => $wire:literal),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ProductCategory {
            $(#[serde(rename = $wire)] $variant,)+
        }

        impl ProductCategory {
            pub const ALL: &'static [ProductCategory] = &[$(ProductCategory::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ProductCategory::$variant => $wire,)+
                }
            }
        }
    };
}

categories! {
    Electronics => "Electronics",
    Automotive => "Automotive",
    Fashion => "Fashion & Clothing",
    Home => "Home & Furniture",
    Beauty => "Beauty & Personal Care",
    Sports => "Sports & Outdoors",
    Books => "Books & Stationery",
    Toys => "Toys & Games",
    Food => "Food & Beverages",
    Health => "Health & Wellness",
    Jewelry => "Jewelry & Accessories",
    Pets => "Pet Supplies",
    Garden => "Garden & Tools",
    Baby => "Baby & Kids",
    Art => "Art & Crafts",
    Music => "Music & Instruments",
    RealEstate => "Real Estate",
    Services => "Services",
    Other => "Other",
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductCategory {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseError::new("category", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub url: String,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLike {
    pub user: AccountId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub user: AccountId,
    pub role: Role,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub business: AccountId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    pub category: ProductCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    pub stock: u64,
    pub in_stock: bool,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub viewed_by: Vec<AccountId>,
    #[serde(default)]
    pub likes: Vec<ProductLike>,
    #[serde(default)]
    pub inquiries: Vec<Inquiry>,
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to list a product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: ProductCategory,
    pub tags: Vec<String>,
    pub stock: u64,
}

impl Product {
    pub fn new(
        business: AccountId,
        input: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let name = check_text("name", &input.name, PRODUCT_NAME_MAX_LEN)?;
        let description = check_text(
            "description",
            &input.description,
            PRODUCT_DESCRIPTION_MAX_LEN,
        )?;
        let price = check_price(input.price)?;
        Ok(Self {
            id: ProductId::new(),
            business,
            name,
            description,
            price,
            currency: DEFAULT_CURRENCY.to_string(),
            images: Vec::new(),
            category: input.category,
            tags: input.tags,
            stock: input.stock,
            in_stock: input.stock > 0,
            views: 0,
            viewed_by: Vec::new(),
            likes: Vec::new(),
            inquiries: Vec::new(),
            is_active: true,
            is_featured: false,
            revision: 0,
            created_at: now,
        })
    }

    /// Keeps `in_stock` in line with `stock`.
    pub fn set_stock(&mut self, stock: u64) {
        self.stock = stock;
        self.in_stock = stock > 0;
    }

    /// Count the first view by each account. Returns true if counted.
    pub fn record_view(&mut self, viewer: AccountId) -> bool {
        if self.viewed_by.contains(&viewer) {
            return false;
        }
        self.viewed_by.push(viewer);
        self.views += 1;
        true
    }

    /// Returns whether the product is now liked by `user`.
    pub fn toggle_like(&mut self, user: AccountId, now: DateTime<Utc>) -> bool {
        if let Some(pos) = self.likes.iter().position(|l| l.user == user) {
            self.likes.remove(pos);
            false
        } else {
            self.likes.push(ProductLike {
                user,
                created_at: now,
            });
            true
        }
    }

    pub fn add_inquiry(
        &mut self,
        user: AccountId,
        role: Role,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let message = check_text("message", message, NOTES_MAX_LEN)?;
        self.inquiries.push(Inquiry {
            user,
            role,
            message,
            created_at: now,
        });
        Ok(())
    }
}

/// Prices must be finite and non-negative.
pub fn check_price(price: f64) -> Result<f64, ValidationError> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(ValidationError::Invalid {
            field: "price",
            reason: "must be a non-negative number",
        })
    }
}

/// Marketplace listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    /// `None` lists every category.
    pub category: Option<ProductCategory>,
    pub search: Option<String>,
}

impl ProductQuery {
    /// `category` of `All` or empty means no filter.
    pub fn parse(category: Option<&str>, search: Option<&str>) -> Result<Self, ParseError> {
        let category = match category.map(str::trim) {
            None | Some("") | Some("All") => None,
            Some(c) => Some(c.parse()?),
        };
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        Ok(Self { category, search })
    }

    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_active {
            return false;
        }
        if self.category.is_some_and(|c| c != product.category) {
            return false;
        }
        match &self.search {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                product.name.to_lowercase().contains(&needle)
                    || product.description.to_lowercase().contains(&needle)
                    || product
                        .tags
                        .iter()
                        .any(|t| t.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Totals across a business's listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAnalytics {
    pub total_products: u64,
    pub total_views: u64,
    pub total_inquiries: u64,
    pub total_likes: u64,
    pub active_products: u64,
}

impl BusinessAnalytics {
    pub fn compute(products: &[Product]) -> Self {
        products.iter().fold(Self::default(), |mut acc, p| {
            acc.total_products += 1;
            acc.total_views += p.views;
            acc.total_inquiries += p.inquiries.len() as u64;
            acc.total_likes += p.likes.len() as u64;
            if p.is_active {
                acc.active_products += 1;
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn product(name: &str, category: ProductCategory, tags: &[&str]) -> Product {
        Product::new(
            AccountId::new(),
            NewProduct {
                name: name.into(),
                description: "A useful thing".into(),
                price: 9.5,
                category,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                stock: 3,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(ProductCategory::ALL.len(), 19);
        assert_eq!(
            "Fashion & Clothing".parse::<ProductCategory>().unwrap(),
            ProductCategory::Fashion
        );
        assert_eq!(
            serde_json::to_string(&ProductCategory::RealEstate).unwrap(),
            "\"Real Estate\""
        );
        assert!("fashion".parse::<ProductCategory>().is_err());
    }

    #[test]
    fn test_new_product_defaults() {
        let p = product("Lamp", ProductCategory::Home, &[]);
        assert_eq!(p.currency, "USD");
        assert!(p.in_stock);
        assert!(p.is_active);
        assert!(!p.is_featured);
    }

    #[test]
    fn test_rejects_negative_price() {
        let err = Product::new(
            AccountId::new(),
            NewProduct {
                name: "Lamp".into(),
                description: "d".into(),
                price: -1.0,
                category: ProductCategory::Home,
                tags: vec![],
                stock: 0,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "price", .. }));
        assert!(check_price(f64::NAN).is_err());
        assert_eq!(check_price(0.0), Ok(0.0));
    }

    #[test]
    fn test_set_stock_tracks_in_stock() {
        let mut p = product("Lamp", ProductCategory::Home, &[]);
        p.set_stock(0);
        assert!(!p.in_stock);
        p.set_stock(5);
        assert!(p.in_stock);
    }

    #[test]
    fn test_views_count_once_per_account() {
        let mut p = product("Lamp", ProductCategory::Home, &[]);
        let viewer = AccountId::new();
        assert!(p.record_view(viewer));
        assert!(!p.record_view(viewer));
        assert_eq!(p.views, 1);
    }

    #[test]
    fn test_like_toggle_and_inquiry() {
        let mut p = product("Lamp", ProductCategory::Home, &[]);
        let user = AccountId::new();
        assert!(p.toggle_like(user, Utc::now()));
        assert!(!p.toggle_like(user, Utc::now()));
        assert!(p.add_inquiry(user, Role::User, "  still available? ", Utc::now()).is_ok());
        assert!(p.add_inquiry(user, Role::User, "  ", Utc::now()).is_err());
        assert_eq!(p.inquiries[0].message, "still available?");
    }

    #[test]
    fn test_query_parse() {
        assert_eq!(ProductQuery::parse(Some("All"), Some("  ")).unwrap(), ProductQuery::default());
        let q = ProductQuery::parse(Some("Electronics"), Some("PHONE")).unwrap();
        assert_eq!(q.category, Some(ProductCategory::Electronics));
        assert_eq!(q.search.as_deref(), Some("phone"));
        assert!(ProductQuery::parse(Some("Gadgets"), None).is_err());
    }

    #[test]
    fn test_query_matches() {
        let phone = product("Smart Phone", ProductCategory::Electronics, &["android"]);
        let mut sofa = product("Sofa", ProductCategory::Home, &["Leather"]);

        let all = ProductQuery::default();
        assert!(all.matches(&phone) && all.matches(&sofa));

        let electronics = ProductQuery::parse(Some("Electronics"), None).unwrap();
        assert!(electronics.matches(&phone));
        assert!(!electronics.matches(&sofa));

        let leather = ProductQuery::parse(None, Some("leather")).unwrap();
        assert!(leather.matches(&sofa));
        assert!(!leather.matches(&phone));

        sofa.is_active = false;
        assert!(!all.matches(&sofa));
    }

    #[test]
    fn test_analytics() {
        let mut a = product("A", ProductCategory::Other, &[]);
        let mut b = product("B", ProductCategory::Other, &[]);
        a.record_view(AccountId::new());
        a.record_view(AccountId::new());
        b.toggle_like(AccountId::new(), Utc::now());
        b.add_inquiry(AccountId::new(), Role::User, "hi", Utc::now()).unwrap();
        b.is_active = false;

        let stats = BusinessAnalytics::compute(&[a, b]);
        assert_eq!(
            stats,
            BusinessAnalytics {
                total_products: 2,
                total_views: 2,
                total_inquiries: 1,
                total_likes: 1,
                active_products: 1,
            }
        );
    }

    proptest! {
        /// Property: an empty query matches exactly the active products.
        #[test]
        fn empty_query_matches_active(active in any::<bool>(), idx in 0usize..19) {
            let mut p = product("X", ProductCategory::ALL[idx], &[]);
            p.is_active = active;
            prop_assert_eq!(ProductQuery::default().matches(&p), active);
        }
    }
}
