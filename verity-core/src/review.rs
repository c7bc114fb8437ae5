//! Review records and the aggregates shown on the reviewer dashboard.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::percentage;
use crate::ids::{AccountId, PostId, ReviewId};
use crate::moderation::Verdict;

/// A citation backing a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub post: PostId,
    pub reviewer: AccountId,
    pub verdict: Verdict,
    pub notes: Option<String>,
    pub confidence: u8,
    pub sources: Vec<Source>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregates for one reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerStats {
    pub total_reviews: u64,
    pub approved_reviews: u64,
    pub rejected_reviews: u64,
    pub pending_reviews: u64,
    pub accuracy: u8,
}

impl ReviewerStats {
    /// `pending` is the size of the reviewer's queue, counted elsewhere.
    pub fn compute(reviews: &[Review], pending: u64) -> Self {
        let total = reviews.len() as u64;
        let approved = reviews.iter().filter(|r| r.verdict.approves()).count() as u64;
        Self {
            total_reviews: total,
            approved_reviews: approved,
            rejected_reviews: total - approved,
            pending_reviews: pending,
            accuracy: percentage(approved, total),
        }
    }
}

/// Group items by key, keeping groups and their items in first-seen order.
pub fn group_in_order<T, K, F>(items: Vec<T>, key: F) -> Vec<(K, Vec<T>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![item]));
            }
        }
    }
    groups
}

/// Group items by author, largest group first. Ties keep first-seen order.
pub fn group_by_author<T, K, F>(items: Vec<T>, key: F) -> Vec<(K, Vec<T>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut groups = group_in_order(items, key);
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    groups
}
