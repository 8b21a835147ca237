// ============================================
// Coarse Ranking (粗排)
// ============================================
//
// Cheap re-scoring of the fused candidate pool: interaction intensity,
// view-count with long-tail boosting, category affinity, and a gentle
// logistic time decay. Never empties the pipeline.

use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::config::CoarseRankingConfig;
use crate::models::{top_categories, CategoryId, GourmetId, InteractionKind, RecommendSnapshot, UserId};

pub struct CoarseRankingLayer {
    config: CoarseRankingConfig,
}

impl CoarseRankingLayer {
    pub fn new(config: CoarseRankingConfig) -> Self {
        Self { config }
    }

    /// Re-score and truncate the fused candidates.
    ///
    /// Candidates are deduplicated at entry (fusion may re-surface history
    /// ids already present). Candidates missing from the catalog are dropped;
    /// if that leaves nothing, the original list is returned truncated so the
    /// pipeline never goes empty on a scoring failure.
    pub fn rank(
        &self,
        candidates: &[GourmetId],
        user_id: UserId,
        snapshot: &RecommendSnapshot,
    ) -> Vec<GourmetId> {
        if candidates.is_empty() {
            warn!("no candidates for coarse ranking");
            return Vec::new();
        }
        let cfg = &self.config;

        let mut seen = HashSet::new();
        let valid: Vec<GourmetId> = candidates
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .filter(|id| snapshot.contains_gourmet(*id))
            .collect();
        if valid.is_empty() {
            warn!("no valid candidates after catalog filter, keeping input order");
            let mut fallback = candidates.to_vec();
            fallback.truncate(cfg.output_limit);
            return fallback;
        }

        let user_interaction_count = snapshot.user_interactions(user_id).count();
        let preferred: Vec<CategoryId> = top_categories(
            &snapshot.user_category_counts(user_id),
            usize::MAX,
        );

        // Active users weight explicit interactions higher and raw view
        // counts lower.
        let shift = (user_interaction_count as f64 * 0.01).min(0.3);
        let interaction_weight = 0.5 + shift;
        let view_weight = 0.5 - shift;
        let category_weight = cfg.category_weight;

        let view_counts = snapshot.view_counts();
        let (view_q1, view_q3) = view_quartiles(&view_counts);

        let mut per_item_interactions: HashMap<GourmetId, Vec<(InteractionKind, f64)>> =
            HashMap::new();
        for i in &snapshot.interactions {
            per_item_interactions
                .entry(i.gourmet_id)
                .or_default()
                .push((i.kind, i.score));
        }

        let mut scored: Vec<(GourmetId, f64)> = Vec::with_capacity(valid.len());
        for id in valid {
            let Some(gourmet) = snapshot.gourmet(id) else {
                continue;
            };

            let interaction_score = per_item_interactions
                .get(&id)
                .map(|rows| {
                    let total: f64 = rows.iter().map(|(kind, score)| interaction_value(*kind, *score)).sum();
                    (total / rows.len() as f64).min(cfg.interaction_score_cap)
                })
                .unwrap_or(0.0);

            let view_count = view_counts.get(&id).copied().unwrap_or(0) as f64;
            let view_boost = if view_count < view_q1 {
                cfg.low_view_boost
            } else if view_count < view_q3 {
                cfg.mid_view_boost
            } else {
                1.0
            };

            let category_score = match gourmet.category_id {
                Some(c) if preferred.contains(&c) => 1.5,
                _ => 1.0,
            };

            let age_days = (snapshot.as_of - gourmet.created_at).num_days() as f64;
            let time_decay = 1.0 / (1.0 + cfg.time_decay_rate * age_days);

            let score = (interaction_score * interaction_weight
                + view_count * view_weight * view_boost
                + category_score * category_weight)
                * time_decay;
            scored.push((id, score));
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let ranked: Vec<GourmetId> =
            scored.into_iter().map(|(id, _)| id).take(cfg.output_limit).collect();
        info!(
            user_id,
            input = candidates.len(),
            output = ranked.len(),
            "coarse ranking completed"
        );
        ranked
    }
}

/// Per-interaction contribution to the intensity score.
fn interaction_value(kind: InteractionKind, score: f64) -> f64 {
    match kind {
        InteractionKind::Upvote => 3.0,
        InteractionKind::Collection => 4.0,
        InteractionKind::View => 1.0,
        InteractionKind::Rating => 2.0 * score,
    }
}

/// 25th/75th percentiles of the view-count distribution (linear
/// interpolation), over items that have views.
fn view_quartiles(view_counts: &HashMap<GourmetId, usize>) -> (f64, f64) {
    if view_counts.is_empty() {
        return (0.0, 0.0);
    }
    let mut values: Vec<f64> = view_counts.values().map(|c| *c as f64).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    (percentile(&values, 0.25), percentile(&values, 0.75))
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
