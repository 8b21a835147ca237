// Category recommendation (類別推薦): independent of the ranking chain, over
// the same interaction/category data.

use tracing::{info, warn};

use crate::models::{top_categories, CategoryId, RecommendSnapshot, UserId};
use std::collections::HashMap;

/// Category display names the user is most likely to browse.
///
/// User's most-interacted categories first; users without category signal get
/// the globally popular ones; an interaction-free snapshot degrades to the
/// first `top_n` catalog categories. Unmapped category ids are skipped.
pub fn recommend_categories(
    snapshot: &RecommendSnapshot,
    user_id: UserId,
    top_n: usize,
) -> Vec<String> {
    let user_counts = snapshot.user_category_counts(user_id);
    let mut names = named(snapshot, &user_counts, top_n);

    if names.is_empty() {
        warn!(user_id, "no user category signal, falling back to popular categories");
        let mut global_counts: HashMap<CategoryId, usize> = HashMap::new();
        for i in &snapshot.interactions {
            if let Some(category) = snapshot.gourmet(i.gourmet_id).and_then(|g| g.category_id) {
                *global_counts.entry(category).or_insert(0) += 1;
            }
        }
        names = named(snapshot, &global_counts, top_n);
    }

    if names.is_empty() {
        warn!("no popular categories, returning catalog defaults");
        names = snapshot
            .categories
            .iter()
            .map(|c| c.name.clone())
            .take(top_n)
            .collect();
    }

    info!(user_id, count = names.len(), "category recommendation");
    names
}

fn named(
    snapshot: &RecommendSnapshot,
    counts: &HashMap<CategoryId, usize>,
    top_n: usize,
) -> Vec<String> {
    top_categories(counts, counts.len())
        .into_iter()
        .filter_map(|id| snapshot.category_name(id).map(str::to_owned))
        .take(top_n)
        .collect()
}
