// ============================================
// Collaborative Filtering Recall (協同過濾召回)
// ============================================
//
// For each item in the user's history, accumulate that item's similarity row
// into unseen candidates, then rank by accumulated score. Cold-start users get
// a popularity/random exploration blend instead.

use rand::seq::SliceRandom;
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::{popularity, RecallContext, RecallError, RecallSource, RecallStrategy};
use crate::models::{GourmetId, UserId};

/// Share of the cold-start blend drawn from popularity recall; the remainder
/// is uniform exploration over the catalog.
const COLD_START_POPULARITY_SHARE: f64 = 0.8;

pub struct CollaborativeFilteringStrategy;

impl RecallStrategy for CollaborativeFilteringStrategy {
    fn source(&self) -> RecallSource {
        RecallSource::CollaborativeFiltering
    }

    fn recall(
        &self,
        ctx: &RecallContext<'_>,
        user_id: UserId,
        limit: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<GourmetId>, RecallError> {
        let history = ctx.snapshot.user_history(user_id);

        if history.is_empty() {
            info!(user_id, "no interaction history, using cold-start blend");
            return Ok(cold_start_blend(ctx, limit, rng));
        }

        let similarity = ctx.similarity.ok_or(RecallError::NoSimilarity)?;
        let seen: HashSet<GourmetId> = history.iter().copied().collect();

        let mut scores: HashMap<GourmetId, f64> = HashMap::new();
        for seed in &history {
            let Some(row) = similarity.row(*seed) else {
                continue;
            };
            for (candidate, sim) in row {
                if !seen.contains(&candidate) {
                    *scores.entry(candidate).or_insert(0.0) += sim;
                }
            }
        }

        let mut ranked: Vec<(GourmetId, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let candidates: Vec<GourmetId> = ranked
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| ctx.snapshot.contains_gourmet(*id))
            .take(limit)
            .collect();

        debug!(
            user_id,
            seeds = history.len(),
            candidates = candidates.len(),
            "collaborative filtering recall"
        );
        Ok(candidates)
    }
}

/// 80% popularity + 20% random catalog sample, deduplicated in order.
fn cold_start_blend(ctx: &RecallContext<'_>, limit: usize, rng: &mut dyn RngCore) -> Vec<GourmetId> {
    let snapshot = ctx.snapshot;
    let pop_share = (limit as f64 * COLD_START_POPULARITY_SHARE) as usize;
    let explore_share =
        ((limit as f64 * (1.0 - COLD_START_POPULARITY_SHARE)) as usize).min(snapshot.gourmets.len());

    let mut blended = popularity::recall(snapshot, pop_share, rng);

    let mut catalog: Vec<GourmetId> = snapshot.gourmets.iter().map(|g| g.id).collect();
    catalog.sort_unstable();
    let explore: Vec<GourmetId> = catalog.choose_multiple(rng, explore_share).copied().collect();
    blended.extend(explore);

    let mut seen = HashSet::new();
    blended.retain(|id| seen.insert(*id));
    blended.truncate(limit);
    blended
}
