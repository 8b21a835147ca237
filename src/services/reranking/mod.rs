// ============================================
// Reranking (重排)
// ============================================
//
// Final, most personalized pass: interaction-volume-dependent weight
// profiles, freshness and category-popularity components, a small seeded
// jitter against deterministic staleness, and a soft category-diversity
// floor during greedy selection.

use rand::{Rng, RngCore};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::RerankingConfig;
use crate::models::{top_categories, CategoryId, GourmetId, RecommendSnapshot, UserId};

/// (category, popularity, freshness) component weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightProfile {
    pub category: f64,
    pub popularity: f64,
    pub freshness: f64,
}

/// Weight profile by the user's interaction volume: heavy users lean on
/// category match, new users on popularity.
pub fn weight_profile(interaction_count: usize) -> WeightProfile {
    if interaction_count > 20 {
        WeightProfile { category: 0.7, popularity: 0.1, freshness: 0.2 }
    } else if interaction_count > 10 {
        WeightProfile { category: 0.6, popularity: 0.2, freshness: 0.2 }
    } else if interaction_count > 3 {
        WeightProfile { category: 0.4, popularity: 0.3, freshness: 0.3 }
    } else {
        WeightProfile { category: 0.3, popularity: 0.5, freshness: 0.2 }
    }
}

pub struct RerankingLayer {
    config: RerankingConfig,
}

impl RerankingLayer {
    pub fn new(config: RerankingConfig) -> Self {
        Self { config }
    }

    /// Top-N selection. Failures (nothing valid to rank) yield an empty list:
    /// the caller treats empty as "no personalized result", not an error.
    pub fn rerank(
        &self,
        candidates: &[GourmetId],
        user_id: UserId,
        snapshot: &RecommendSnapshot,
        top_n: usize,
        rng: &mut dyn RngCore,
    ) -> Vec<GourmetId> {
        if candidates.is_empty() {
            warn!("no candidates for reranking");
            return Vec::new();
        }

        let valid: Vec<GourmetId> = candidates
            .iter()
            .copied()
            .filter(|id| snapshot.contains_gourmet(*id))
            .collect();
        if valid.is_empty() {
            warn!("no valid candidates after catalog filter");
            return Vec::new();
        }

        let user_counts = snapshot.user_category_counts(user_id);
        let mut preferred: Vec<CategoryId> = top_categories(&user_counts, 3);
        if preferred.is_empty() {
            preferred = top_categories(&snapshot.catalog_category_counts(), 3);
        }

        let interaction_count: usize = user_counts.values().sum();
        let weights = weight_profile(interaction_count);

        let catalog_size = snapshot.gourmets.len() as f64;
        let category_counts = snapshot.catalog_category_counts();

        let mut scored: Vec<(GourmetId, f64, Option<CategoryId>)> = Vec::with_capacity(valid.len());
        for id in valid {
            let Some(gourmet) = snapshot.gourmet(id) else {
                continue;
            };
            let age_days = (snapshot.as_of - gourmet.created_at).num_days() as f64;
            let freshness = (-self.config.freshness_decay * age_days).exp();
            let category_preference = match gourmet.category_id {
                Some(c) if preferred.contains(&c) => 2.0,
                _ => 1.0,
            };
            let category_popularity = gourmet
                .category_id
                .and_then(|c| category_counts.get(&c))
                .map(|count| *count as f64 / catalog_size)
                .unwrap_or(0.0);

            let jitter = rng.gen_range(1.0 - self.config.jitter..=1.0 + self.config.jitter);
            let score = (weights.freshness * freshness
                + weights.category * category_preference
                + weights.popularity * category_popularity)
                * jitter;
            scored.push((id, score, gourmet.category_id));
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let selected = self.select_with_diversity(&scored, top_n);
        info!(
            user_id,
            input = candidates.len(),
            output = selected.len(),
            "reranking completed"
        );
        selected
    }

    /// Greedy selection with a soft diversity floor: admit by descending
    /// score, but once the open slots are down to the number of categories
    /// still missing from the floor, hold them for unrepresented categories.
    /// No hard per-category cap.
    fn select_with_diversity(
        &self,
        scored: &[(GourmetId, f64, Option<CategoryId>)],
        top_n: usize,
    ) -> Vec<GourmetId> {
        let floor = self.config.diversity_floor;
        let mut selected: Vec<GourmetId> = Vec::new();
        let mut categories: HashSet<Option<CategoryId>> = HashSet::new();

        for (id, _, category) in scored {
            if selected.len() >= top_n {
                break;
            }
            let missing = floor.saturating_sub(categories.len());
            let remaining = top_n - selected.len();
            if missing > 0 && remaining <= missing && categories.contains(category) {
                // reserved for a category not yet represented
                continue;
            }
            selected.push(*id);
            categories.insert(*category);
        }

        // Slots held back but never claimed (fewer categories than the floor
        // in the pool): fill with the best remaining by score.
        if selected.len() < top_n {
            for (id, _, _) in scored {
                if !selected.contains(id) {
                    selected.push(*id);
                    if selected.len() >= top_n {
                        break;
                    }
                }
            }
        }

        selected.truncate(top_n);
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InteractionKind;
    use crate::services::recall::test_support::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer() -> RerankingLayer {
        RerankingLayer::new(RerankingConfig::default())
    }

    #[test]
    fn test_empty_candidates_return_empty() {
        let snapshot = snapshot(vec![gourmet(1, Some(1), 2)], vec![]);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(layer().rerank(&[], 7, &snapshot, 5, &mut rng).is_empty());
        assert!(layer().rerank(&[99], 7, &snapshot, 5, &mut rng).is_empty());
    }

    #[test]
    fn test_weight_profiles_by_volume() {
        assert_eq!(
            weight_profile(25),
            WeightProfile { category: 0.7, popularity: 0.1, freshness: 0.2 }
        );
        assert_eq!(
            weight_profile(15),
            WeightProfile { category: 0.6, popularity: 0.2, freshness: 0.2 }
        );
        assert_eq!(
            weight_profile(5),
            WeightProfile { category: 0.4, popularity: 0.3, freshness: 0.3 }
        );
        assert_eq!(
            weight_profile(2),
            WeightProfile { category: 0.3, popularity: 0.5, freshness: 0.2 }
        );
        // boundaries are exclusive
        assert_eq!(weight_profile(20).category, 0.6);
        assert_eq!(weight_profile(10).category, 0.4);
        assert_eq!(weight_profile(3).category, 0.3);
    }

    #[test]
    fn test_diversity_floor_reached_when_feasible() {
        // 10 strong items in category 1 and single items in categories 2, 3
        let mut gourmets: Vec<_> = (1..=10).map(|i| gourmet(i, Some(1), 1)).collect();
        gourmets.push(gourmet(11, Some(2), 400));
        gourmets.push(gourmet(12, Some(3), 400));
        // user 7 strongly prefers category 1
        let interactions: Vec<_> = (1..=25)
            .map(|_| interaction(7, 1, InteractionKind::View, 0.0, 1))
            .collect();
        let snapshot = snapshot(gourmets, interactions);
        let candidates: Vec<GourmetId> = (1..=12).collect();
        let mut rng = StdRng::seed_from_u64(17);

        let result = layer().rerank(&candidates, 7, &snapshot, 6, &mut rng);
        assert_eq!(result.len(), 6);
        let distinct: HashSet<_> = result
            .iter()
            .map(|id| snapshot.gourmet(*id).unwrap().category_id)
            .collect();
        assert!(distinct.len() >= 3, "diversity floor not reached: {distinct:?}");
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let gourmets: Vec<_> = (1..=8).map(|i| gourmet(i, Some(1 + i % 3), i)).collect();
        let snapshot = snapshot(gourmets, vec![]);
        let candidates: Vec<GourmetId> = (1..=8).collect();

        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);
        let a = layer().rerank(&candidates, 7, &snapshot, 5, &mut rng_a);
        let b = layer().rerank(&candidates, 7, &snapshot, 5, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_output_bounded_by_top_n() {
        let gourmets: Vec<_> = (1..=20).map(|i| gourmet(i, Some(1 + i % 4), 2)).collect();
        let snapshot = snapshot(gourmets, vec![]);
        let candidates: Vec<GourmetId> = (1..=20).collect();
        let mut rng = StdRng::seed_from_u64(7);
        for top_n in [0usize, 1, 3, 15, 40] {
            let result = layer().rerank(&candidates, 7, &snapshot, top_n, &mut rng);
            assert!(result.len() <= top_n.min(20));
        }
    }
}
