mod collaborative;
mod content_based;
mod popularity;

use rand::RngCore;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{GourmetId, RecommendSnapshot, UserId};
use crate::services::similarity::ItemSimilarity;

pub use collaborative::CollaborativeFilteringStrategy;
pub use content_based::ContentBasedStrategy;

/// Why a recall strategy could not produce a personalized candidate set.
///
/// The fallback path is explicit: strategies report the reason, the layer
/// decides what replaces them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecallError {
    #[error("similarity matrix unavailable")]
    NoSimilarity,
    #[error("user {0} has no interaction history")]
    NoHistory(UserId),
    #[error("feature table is empty")]
    NoFeatures,
    #[error("no usable feature vectors for user {0}")]
    DegenerateFeatures(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallSource {
    CollaborativeFiltering,
    ContentBased,
    Popularity,
}

impl RecallSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecallSource::CollaborativeFiltering => "cf",
            RecallSource::ContentBased => "cb",
            RecallSource::Popularity => "pop",
        }
    }
}

/// Read-only inputs shared by every strategy in one request.
pub struct RecallContext<'a> {
    pub snapshot: &'a RecommendSnapshot,
    pub similarity: Option<&'a ItemSimilarity>,
}

/// Recall 策略特徵
pub trait RecallStrategy {
    fn source(&self) -> RecallSource;

    fn recall(
        &self,
        ctx: &RecallContext<'_>,
        user_id: UserId,
        limit: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<GourmetId>, RecallError>;
}

/// Per-source candidate sequences, ranked best-first.
#[derive(Debug, Clone, Default)]
pub struct RecallSet {
    pub cf: Vec<GourmetId>,
    pub cb: Vec<GourmetId>,
    pub pop: Vec<GourmetId>,
}

/// Recall 層：runs the three strategies and sequences their fallbacks.
///
/// Popularity recall is computed first and doubles as the replacement for a
/// failed CF or CB run, so degradation reuses the same ranked list instead of
/// re-rolling its random padding.
pub struct RecallLayer {
    limit: usize,
}

impl RecallLayer {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn recall_candidates(
        &self,
        ctx: &RecallContext<'_>,
        user_id: UserId,
        rng: &mut dyn RngCore,
    ) -> RecallSet {
        let pop = popularity::recall(ctx.snapshot, self.limit, rng);

        let cf = self.run_or_fallback(&CollaborativeFilteringStrategy, ctx, user_id, &pop, rng);
        let cb = self.run_or_fallback(&ContentBasedStrategy, ctx, user_id, &pop, rng);

        info!(
            user_id,
            cf = cf.len(),
            cb = cb.len(),
            pop = pop.len(),
            "recall completed"
        );

        RecallSet { cf, cb, pop }
    }

    fn run_or_fallback(
        &self,
        strategy: &dyn RecallStrategy,
        ctx: &RecallContext<'_>,
        user_id: UserId,
        pop: &[GourmetId],
        rng: &mut dyn RngCore,
    ) -> Vec<GourmetId> {
        match strategy.recall(ctx, user_id, self.limit, rng) {
            Ok(candidates) => candidates,
            Err(reason) => {
                warn!(
                    user_id,
                    source = strategy.source().as_str(),
                    %reason,
                    "recall strategy degraded to popularity"
                );
                pop.to_vec()
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::InteractionKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_failed_strategy_reuses_popularity_list() {
        // user 9 has history but there is no similarity matrix and no feature
        // table: both CF and CB must degrade to the popularity list
        let snapshot = snapshot(
            vec![gourmet(1, Some(1), 5), gourmet(2, Some(2), 5), gourmet(3, Some(3), 5)],
            vec![
                interaction(9, 1, InteractionKind::Upvote, 0.0, 1),
                interaction(8, 2, InteractionKind::Rating, 5.0, 2),
                interaction(7, 3, InteractionKind::Rating, 4.0, 2),
            ],
        );
        let ctx = RecallContext { snapshot: &snapshot, similarity: None };
        let layer = RecallLayer::new(3);
        let mut rng = StdRng::seed_from_u64(11);

        let set = layer.recall_candidates(&ctx, 9, &mut rng);
        assert!(!set.pop.is_empty());
        assert_eq!(set.cf, set.pop);
        assert_eq!(set.cb, set.pop);
    }

    #[test]
    fn test_zero_history_user_degrades_toward_popularity() {
        let snapshot = snapshot(
            (1..=6).map(|i| gourmet(i, Some(1 + i % 3), 4)).collect(),
            vec![
                interaction(1, 1, InteractionKind::Rating, 5.0, 1),
                interaction(2, 1, InteractionKind::Rating, 4.0, 1),
                interaction(3, 2, InteractionKind::Upvote, 0.0, 2),
            ],
        );
        let ctx = RecallContext { snapshot: &snapshot, similarity: None };
        let layer = RecallLayer::new(5);
        let mut rng = StdRng::seed_from_u64(33);

        // user 42 has no rows: CB falls back to the exact popularity list, CF
        // runs its cold-start blend whose popularity share leads the output
        let set = layer.recall_candidates(&ctx, 42, &mut rng);
        assert_eq!(set.cb, set.pop);
        assert!(!set.cf.is_empty());
        assert_eq!(&set.cf[..2], &set.pop[..2]);
    }

    #[test]
    fn test_recall_source_labels() {
        assert_eq!(RecallSource::CollaborativeFiltering.as_str(), "cf");
        assert_eq!(RecallSource::ContentBased.as_str(), "cb");
        assert_eq!(RecallSource::Popularity.as_str(), "pop");
    }
}
