use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::vocabulary::FeatureVocabulary;

pub type UserId = i64;
pub type GourmetId = i64;
pub type CategoryId = i64;

/// 交互類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionKind {
    Upvote,
    Collection,
    View,
    Rating,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub gourmet_id: GourmetId,
    pub kind: InteractionKind,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

/// One catalog item. Immutable within a recommendation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gourmet {
    pub id: GourmetId,
    pub title: String,
    pub category_id: Option<CategoryId>,
    pub cover: Option<String>,
    pub created_at: DateTime<Utc>,
    pub owner_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: UserId,
    pub name: String,
    pub avatar: Option<String>,
}

/// Fixed-dimension content feature vectors, keyed by item.
///
/// Every vector in one table has the same dimensionality, fixed by the
/// vocabulary version the table was built against. All-zero vectors carry no
/// signal and are rejected at insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureTable {
    pub vocabulary_version: u64,
    vectors: BTreeMap<GourmetId, Vec<f64>>,
}

impl FeatureTable {
    pub fn new(vocabulary: &FeatureVocabulary) -> Self {
        Self {
            vocabulary_version: vocabulary.version(),
            vectors: BTreeMap::new(),
        }
    }

    /// Insert a vector; all-zero vectors are "no signal" and are dropped.
    pub fn insert(&mut self, gourmet_id: GourmetId, vector: Vec<f64>) -> bool {
        if vector.is_empty() || vector.iter().all(|v| *v == 0.0) {
            return false;
        }
        self.vectors.insert(gourmet_id, vector);
        true
    }

    pub fn get(&self, gourmet_id: GourmetId) -> Option<&[f64]> {
        self.vectors.get(&gourmet_id).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (GourmetId, &[f64])> {
        self.vectors.iter().map(|(id, v)| (*id, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Request-scoped, read-only snapshot of everything the pipeline consumes.
///
/// `as_of` is the load instant; every age/decay computation in the pipeline
/// is relative to it, so a frozen snapshot yields frozen scores.
#[derive(Debug, Clone)]
pub struct RecommendSnapshot {
    pub as_of: DateTime<Utc>,
    pub interactions: Vec<Interaction>,
    pub gourmets: Vec<Gourmet>,
    pub features: FeatureTable,
    pub categories: Vec<Category>,
    pub owners: Vec<Owner>,
}

impl RecommendSnapshot {
    pub fn gourmet(&self, id: GourmetId) -> Option<&Gourmet> {
        self.gourmets.iter().find(|g| g.id == id)
    }

    pub fn contains_gourmet(&self, id: GourmetId) -> bool {
        self.gourmets.iter().any(|g| g.id == id)
    }

    pub fn category_name(&self, id: CategoryId) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    pub fn owner(&self, id: UserId) -> Option<&Owner> {
        self.owners.iter().find(|o| o.id == id)
    }

    /// Interaction rows for one user, in table order.
    pub fn user_interactions(&self, user_id: UserId) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter().filter(move |i| i.user_id == user_id)
    }

    /// Distinct items the user interacted with, first-occurrence order.
    pub fn user_history(&self, user_id: UserId) -> Vec<GourmetId> {
        let mut seen = HashSet::new();
        self.user_interactions(user_id)
            .filter(|i| seen.insert(i.gourmet_id))
            .map(|i| i.gourmet_id)
            .collect()
    }

    /// VIEW-kind interaction counts per item, across all users.
    pub fn view_counts(&self) -> HashMap<GourmetId, usize> {
        let mut counts = HashMap::new();
        for i in &self.interactions {
            if i.kind == InteractionKind::View {
                *counts.entry(i.gourmet_id).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Interaction counts per item regardless of kind.
    pub fn interaction_counts(&self) -> HashMap<GourmetId, usize> {
        let mut counts = HashMap::new();
        for i in &self.interactions {
            *counts.entry(i.gourmet_id).or_insert(0) += 1;
        }
        counts
    }

    /// User's per-category interaction counts (one count per interaction row,
    /// items missing from the catalog or without a category are skipped).
    pub fn user_category_counts(&self, user_id: UserId) -> HashMap<CategoryId, usize> {
        let mut counts = HashMap::new();
        for i in self.user_interactions(user_id) {
            if let Some(category) = self.gourmet(i.gourmet_id).and_then(|g| g.category_id) {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Catalog-wide item counts per category.
    pub fn catalog_category_counts(&self) -> HashMap<CategoryId, usize> {
        let mut counts = HashMap::new();
        for g in &self.gourmets {
            if let Some(category) = g.category_id {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Top-N categories from a count map, highest count first, ids breaking ties.
pub(crate) fn top_categories(counts: &HashMap<CategoryId, usize>, n: usize) -> Vec<CategoryId> {
    let mut entries: Vec<(CategoryId, usize)> = counts.iter().map(|(k, v)| (*k, *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    entries.into_iter().take(n).map(|(id, _)| id).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedGourmet {
    pub id: String,
    pub title: String,
    #[serde(rename = "categoryName")]
    pub category_name: String,
    pub cover: String,
    #[serde(rename = "userAvatar")]
    pub owner_avatar: String,
    #[serde(rename = "userName")]
    pub owner_name: String,
    /// ISO-8601
    #[serde(rename = "createTime")]
    pub create_time: String,
    #[serde(rename = "viewCount")]
    pub view_count: String,
}

/// Shape-stable response: internal failures yield empty lists, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: UserId,
    pub recommended_gourmets: Vec<RecommendedGourmet>,
    pub recommended_categories: Vec<String>,
}
