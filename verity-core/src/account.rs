//! Accounts for all three roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AccountId;
use crate::name::{clean_full_name, split_full_name};
use crate::role::Role;
use crate::validate::ValidationError;

/// Trust score every account starts with.
pub const DEFAULT_TRUST_SCORE: u8 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub business_name: Option<String>,
}

impl UserInfo {
    /// Clean `raw` and derive first/last name from it.
    pub fn from_full_name(raw: &str) -> Self {
        let full_name = clean_full_name(raw);
        let (first_name, last_name) = split_full_name(&full_name);
        Self {
            full_name,
            first_name,
            last_name,
            business_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInfo {
    pub avatar: Option<String>,
    pub bio: String,
    pub website: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialStats {
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trust {
    pub trust_score: u8,
    pub is_verified: bool,
    pub is_active: bool,
}

impl Default for Trust {
    fn default() -> Self {
        Self {
            trust_score: DEFAULT_TRUST_SCORE,
            is_verified: false,
            is_active: true,
        }
    }
}

/// Running counters kept on reviewer accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerCounters {
    pub reviews_completed: u64,
    pub approved_count: u64,
    pub rejected_count: u64,
    pub accuracy: u8,
    pub last_review_at: Option<DateTime<Utc>>,
}

impl ReviewerCounters {
    /// Count one more decision.
    pub fn record(&mut self, approved: bool, at: DateTime<Utc>) {
        self.reviews_completed += 1;
        if approved {
            self.approved_count += 1;
        } else {
            self.rejected_count += 1;
        }
        self.accuracy = percentage(self.approved_count, self.reviews_completed);
        self.last_review_at = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessDetails {
    pub business_type: String,
    pub subscription_plan: String,
}

impl Default for BusinessDetails {
    fn default() -> Self {
        Self {
            business_type: "General".to_string(),
            subscription_plan: "Free".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub user_info: UserInfo,
    #[serde(default)]
    pub profile_info: ProfileInfo,
    #[serde(default)]
    pub social_stats: SocialStats,
    #[serde(default)]
    pub trust: Trust,
    /// Present on reviewer accounts only.
    #[serde(default)]
    pub reviewer_stats: Option<ReviewerCounters>,
    /// Present on business accounts only.
    #[serde(default)]
    pub business_details: Option<BusinessDetails>,
    #[serde(default)]
    pub activity: Activity,
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A fresh account with role-specific sections initialised.
    pub fn new(
        email: &str,
        password_hash: String,
        role: Role,
        full_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            email: normalize_email(email),
            password_hash,
            role,
            user_info: UserInfo::from_full_name(full_name),
            profile_info: ProfileInfo::default(),
            social_stats: SocialStats::default(),
            trust: Trust::default(),
            reviewer_stats: (role == Role::Reviewer).then(ReviewerCounters::default),
            business_details: (role == Role::Business).then(BusinessDetails::default),
            activity: Activity::default(),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.activity.last_login = Some(now);
        self.activity.login_count += 1;
        self.updated_at = now;
    }

    /// Replace first and/or last name and recompute the full name from them.
    pub fn rename(&mut self, first_name: Option<&str>, last_name: Option<&str>) {
        if let Some(first) = first_name.map(str::trim).filter(|s| !s.is_empty()) {
            self.user_info.first_name = first.to_string();
        }
        if let Some(last) = last_name.map(str::trim).filter(|s| !s.is_empty()) {
            self.user_info.last_name = last.to_string();
        }
        self.user_info.full_name =
            format!("{} {}", self.user_info.first_name, self.user_info.last_name)
                .trim()
                .to_string();
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            full_name: self.user_info.full_name.clone(),
            email: self.email.clone(),
            avatar: self.profile_info.avatar.clone(),
            role: self.role,
        }
    }
}

/// The author block attached to posts, stories and review queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: AccountId,
    pub full_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
}

/// Emails are unique regardless of case or surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalise `email` and check it looks like `local@domain.tld`.
pub fn check_email(email: &str) -> Result<String, ValidationError> {
    let email = normalize_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ValidationError::Invalid {
            field: "email",
            reason: "must be a valid email address",
        })
    }
}

/// `round(part / whole * 100)`, 0 when `whole` is 0.
pub fn percentage(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u8
}
