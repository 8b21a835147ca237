// ============================================
// Content-Based Recall (基於內容召回)
// ============================================
//
// Builds a user profile vector by averaging the normalized feature vectors of
// interacted items, then scores every catalog item by cosine similarity with
// a category-concentration boost and a popularity factor.

use rand::{Rng, RngCore};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{RecallContext, RecallError, RecallSource, RecallStrategy};
use crate::models::{top_categories, CategoryId, GourmetId, UserId};

pub struct ContentBasedStrategy;

impl RecallStrategy for ContentBasedStrategy {
    fn source(&self) -> RecallSource {
        RecallSource::ContentBased
    }

    fn recall(
        &self,
        ctx: &RecallContext<'_>,
        user_id: UserId,
        limit: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<GourmetId>, RecallError> {
        let snapshot = ctx.snapshot;
        if snapshot.features.is_empty() {
            return Err(RecallError::NoFeatures);
        }

        let history = snapshot.user_history(user_id);
        if history.is_empty() {
            return Err(RecallError::NoHistory(user_id));
        }
        let interacted: HashSet<GourmetId> = history.iter().copied().collect();

        let user_counts = snapshot.user_category_counts(user_id);
        let mut preferred: Vec<CategoryId> = top_categories(&user_counts, 3);
        if preferred.is_empty() {
            preferred = top_categories(&snapshot.catalog_category_counts(), 3);
        }
        let boost_factor = category_boost_factor(&user_counts);

        // User profile vector from the history's feature vectors.
        let mut profile_inputs: Vec<Vec<f64>> = history
            .iter()
            .filter_map(|id| snapshot.features.get(*id))
            .filter(|v| !v.is_empty())
            .map(|v| v.to_vec())
            .collect();
        if profile_inputs.is_empty() {
            return Err(RecallError::DegenerateFeatures(user_id));
        }

        let dim = profile_inputs.iter().map(|v| v.len()).max().unwrap_or(0);
        for v in &mut profile_inputs {
            conform(v, dim, rng);
            normalize(v);
        }
        let mut user_vector = vec![0.0; dim];
        for v in &profile_inputs {
            for (acc, x) in user_vector.iter_mut().zip(v) {
                *acc += x;
            }
        }
        let n = profile_inputs.len() as f64;
        for x in &mut user_vector {
            *x /= n;
        }
        let user_norm = l2(&user_vector);
        if user_norm <= 0.0 {
            warn!(user_id, "degenerate user profile vector");
            return Err(RecallError::DegenerateFeatures(user_id));
        }

        // Cosine against every unseen catalog item.
        let mut candidates: Vec<(GourmetId, f64, Option<CategoryId>)> = Vec::new();
        for (id, vector) in snapshot.features.iter() {
            if vector.is_empty() || interacted.contains(&id) {
                continue;
            }
            let Some(gourmet) = snapshot.gourmet(id) else {
                continue;
            };
            let mut v = vector.to_vec();
            conform(&mut v, dim, rng);
            normalize(&mut v);
            let similarity = dot(&user_vector, &v) / user_norm;
            candidates.push((id, similarity, gourmet.category_id));
        }
        if candidates.is_empty() {
            return Err(RecallError::DegenerateFeatures(user_id));
        }

        // Popularity factor over the candidate pool.
        let counts = snapshot.interaction_counts();
        let max_count = candidates
            .iter()
            .map(|(id, _, _)| counts.get(id).copied().unwrap_or(0))
            .max()
            .unwrap_or(0)
            .max(1) as f64;

        let mut scored: Vec<(GourmetId, f64)> = candidates
            .into_iter()
            .map(|(id, similarity, category)| {
                let boost = match category {
                    Some(c) if preferred.contains(&c) => boost_factor,
                    _ => 1.0,
                };
                let count = counts.get(&id).copied().unwrap_or(0) as f64;
                let popularity_factor = 0.3 + 0.7 * (count / max_count);
                (id, similarity * boost * popularity_factor)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let result: Vec<GourmetId> = scored.into_iter().map(|(id, _)| id).take(limit).collect();
        debug!(user_id, candidates = result.len(), "content-based recall");
        Ok(result)
    }
}

/// Boost in [1.5, 2.0] from the normalized entropy of the user's category
/// distribution: concentrated taste boosts preferred categories harder.
fn category_boost_factor(counts: &std::collections::HashMap<CategoryId, usize>) -> f64 {
    if counts.is_empty() {
        return 1.5;
    }
    let total: usize = counts.values().sum();
    let entropy: f64 = counts
        .values()
        .map(|c| {
            let p = *c as f64 / total as f64;
            -p * (p + 1e-10).log2()
        })
        .sum();
    let max_entropy = (counts.len() as f64).log2();
    // single-category history: zero max entropy means fully concentrated
    let concentration = if max_entropy > 0.0 { 1.0 - entropy / max_entropy } else { 1.0 };
    (1.5 + 0.5 * concentration).clamp(1.5, 2.0)
}

/// Pad (or truncate) to `dim`, replacing all-zero vectors with small uniform
/// noise so they carry a usable direction instead of being dropped.
fn conform<R: Rng + ?Sized>(v: &mut Vec<f64>, dim: usize, rng: &mut R) {
    v.resize(dim, 0.0);
    if v.iter().all(|x| *x == 0.0) {
        for x in v.iter_mut() {
            *x = rng.gen_range(0.001..0.01);
        }
    }
}

fn normalize(v: &mut [f64]) {
    let norm = l2(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn l2(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
