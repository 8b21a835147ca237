// ============================================
// Fusion (多路召回融合)
// ============================================
//
// Merges the three ranked candidate sequences into one scored set: per-source
// rank-decay scores, max-merge across sources, negative-feedback filtering,
// and re-surfacing of a sample of the user's own history.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::FusionConfig;
use crate::models::{GourmetId, RecommendSnapshot, UserId};
use crate::services::recall::RecallSet;

pub struct FusionLayer {
    config: FusionConfig,
}

impl FusionLayer {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Fused candidate list, best-first.
    pub fn fuse(
        &self,
        user_id: UserId,
        recall: &RecallSet,
        snapshot: &RecommendSnapshot,
    ) -> Vec<GourmetId> {
        let cfg = &self.config;

        let mut scores: HashMap<GourmetId, f64> = HashMap::new();
        for (candidates, weight) in [
            (&recall.cf, cfg.cf_weight),
            (&recall.cb, cfg.cb_weight),
            (&recall.pop, cfg.pop_weight),
        ] {
            self.merge_source(&mut scores, candidates, weight);
        }

        // Unconditional negative-feedback filter: anything the user scored
        // below the threshold never surfaces, no matter how well it recalled.
        let negative: HashSet<GourmetId> = snapshot
            .user_interactions(user_id)
            .filter(|i| i.score < cfg.negative_threshold)
            .map(|i| i.gourmet_id)
            .collect();
        if !negative.is_empty() {
            debug!(user_id, negatives = negative.len(), "applying negative-feedback filter");
        }

        let mut fused: Vec<(GourmetId, f64)> = scores
            .into_iter()
            .filter(|(id, _)| !negative.contains(id))
            .collect();
        fused.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let mut candidates: Vec<GourmetId> =
            fused.into_iter().map(|(id, _)| id).take(cfg.fused_limit).collect();

        // Re-surface a sample of the user's history (re-engagement signal);
        // duplicates are tolerated here and resolved at coarse ranking. The
        // negative filter still applies: disliked history stays out.
        let history = snapshot.user_history(user_id);
        candidates.extend(
            history
                .into_iter()
                .filter(|id| !negative.contains(id))
                .take(cfg.history_sample),
        );

        if candidates.is_empty() && !snapshot.gourmets.is_empty() {
            warn!(user_id, "empty fusion result, substituting full catalog");
            candidates = snapshot.gourmets.iter().map(|g| g.id).collect();
        }

        info!(user_id, fused = candidates.len(), "fusion completed");
        candidates
    }

    /// Rank-decay score for one source, max-merged into the accumulator.
    ///
    /// score = weight × (1 − slope × idx / len): near-linear decay that halves
    /// at the end of the list rather than reaching zero. When an item appears
    /// in several sources the maximum wins, so multi-source items are not
    /// over-counted.
    fn merge_source(
        &self,
        scores: &mut HashMap<GourmetId, f64>,
        candidates: &[GourmetId],
        weight: f64,
    ) {
        let mut seen = HashSet::new();
        let deduped: Vec<GourmetId> = candidates
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .take(self.config.per_source_cap)
            .collect();
        let len = deduped.len();
        if len == 0 {
            return;
        }

        for (idx, id) in deduped.into_iter().enumerate() {
            let score = weight * (1.0 - self.config.rank_decay * idx as f64 / len as f64);
            scores
                .entry(id)
                .and_modify(|existing| {
                    if score > *existing {
                        *existing = score;
                    }
                })
                .or_insert(score);
        }
    }
}
