// ============================================
// Popularity Recall (流行度召回)
// ============================================
//
// Terminal fallback for the other strategies: never fails, degrades to
// uniform random sampling when popularity signal runs out.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::models::{CategoryId, GourmetId, RecommendSnapshot};

#[derive(Default)]
struct PopularityAgg {
    count: usize,
    decay_sum: f64,
    score_sum: f64,
    last_interaction: Option<DateTime<Utc>>,
}

/// Time-decayed popularity recall with a per-category admission cap.
pub fn recall<R: Rng + ?Sized>(
    snapshot: &RecommendSnapshot,
    limit: usize,
    rng: &mut R,
) -> Vec<GourmetId> {
    if snapshot.gourmets.is_empty() {
        warn!("empty catalog, popularity recall returns nothing");
        return Vec::new();
    }

    let mut candidates: Vec<GourmetId> = Vec::new();
    if !snapshot.interactions.is_empty() {
        let scored = score_by_popularity(snapshot);
        candidates = admit_with_category_cap(&scored, snapshot, limit);
    }

    // Pad with uniform random catalog items when popularity runs short.
    if candidates.len() < limit {
        let chosen: HashSet<GourmetId> = candidates.iter().copied().collect();
        let mut remaining: Vec<GourmetId> = snapshot
            .gourmets
            .iter()
            .map(|g| g.id)
            .filter(|id| !chosen.contains(id))
            .collect();
        remaining.sort_unstable();
        let padding: Vec<GourmetId> = remaining
            .choose_multiple(rng, limit - candidates.len())
            .copied()
            .collect();
        if !padding.is_empty() {
            debug!(
                short = limit - candidates.len(),
                padded = padding.len(),
                "popularity recall padded with random items"
            );
            candidates.extend(padding);
        }
    }

    candidates.truncate(limit);
    candidates
}

/// Composite popularity score per catalog item, best first.
fn score_by_popularity(snapshot: &RecommendSnapshot) -> Vec<(GourmetId, f64)> {
    let now = snapshot.as_of;

    // Dynamic decay rate from the age of the oldest interaction.
    let oldest = snapshot
        .interactions
        .iter()
        .map(|i| i.created_at)
        .min()
        .unwrap_or(now);
    let max_days = (now - oldest).num_days();
    let decay_rate = if max_days > 0 { 2.0 / max_days as f64 } else { 0.01 };

    let mut aggs: HashMap<GourmetId, PopularityAgg> = HashMap::new();
    for i in &snapshot.interactions {
        let agg = aggs.entry(i.gourmet_id).or_default();
        let age_days = (now - i.created_at).num_days() as f64;
        agg.count += 1;
        agg.decay_sum += (-decay_rate * age_days).exp();
        agg.score_sum += i.score;
        agg.last_interaction = Some(match agg.last_interaction {
            Some(t) if t > i.created_at => t,
            _ => i.created_at,
        });
    }

    let mut scored: Vec<(GourmetId, f64)> = aggs
        .into_iter()
        .filter(|(id, _)| snapshot.contains_gourmet(*id))
        .map(|(id, agg)| {
            let n = agg.count as f64;
            let mean_decay = agg.decay_sum / n;
            let mean_score = agg.score_sum / n;
            let recency_days = agg
                .last_interaction
                .map(|t| (now - t).num_days() as f64)
                .unwrap_or(0.0);
            let recency = (-0.01 * recency_days).exp();
            let composite = (n * 0.3 + mean_score * 0.4 + recency * 0.3) * mean_decay;
            (id, composite)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    scored
}

/// Fill best-first while holding each category to max(limit/5, 3) slots, then
/// lift the cap for whatever is still missing.
fn admit_with_category_cap(
    scored: &[(GourmetId, f64)],
    snapshot: &RecommendSnapshot,
    limit: usize,
) -> Vec<GourmetId> {
    let category_cap = (limit / 5).max(3);
    let mut selected: Vec<GourmetId> = Vec::new();
    let mut per_category: HashMap<Option<CategoryId>, usize> = HashMap::new();

    for (id, _) in scored {
        if selected.len() >= limit {
            break;
        }
        let category = snapshot.gourmet(*id).and_then(|g| g.category_id);
        let used = per_category.entry(category).or_insert(0);
        if *used < category_cap {
            selected.push(*id);
            *used += 1;
        }
    }

    if selected.len() < limit {
        for (id, _) in scored {
            if selected.len() >= limit {
                break;
            }
            if !selected.contains(id) {
                selected.push(*id);
            }
        }
    }

    selected
}
