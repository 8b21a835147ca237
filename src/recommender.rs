//! Top-level orchestrator wiring the pipeline stages together:
//! similarity → recall (CF ‖ CB ‖ POP) → fusion → coarse ranking → reranking,
//! plus the independent category recommendation.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::{error, info};

use crate::config::RecommendConfig;
use crate::models::{
    GourmetId, RecommendSnapshot, RecommendationResponse, RecommendedGourmet, UserId,
};
use crate::services::categories;
use crate::services::coarse_ranking::CoarseRankingLayer;
use crate::services::fusion::FusionLayer;
use crate::services::recall::{RecallContext, RecallLayer};
use crate::services::reranking::RerankingLayer;
use crate::services::similarity::SimilarityCache;

/// Collaborator seam for the data-access layer: hands the pipeline a fresh
/// request-scoped snapshot. Storage, SQL, and auth live behind it.
pub trait SnapshotLoader {
    fn load(&self) -> Result<RecommendSnapshot>;
}

impl<F> SnapshotLoader for F
where
    F: Fn() -> Result<RecommendSnapshot>,
{
    fn load(&self) -> Result<RecommendSnapshot> {
        self()
    }
}

pub struct Recommender<L> {
    loader: L,
    config: RecommendConfig,
    similarity_cache: SimilarityCache,
    rng: StdRng,
}

impl<L: SnapshotLoader> Recommender<L> {
    pub fn new(loader: L, config: RecommendConfig) -> Self {
        Self {
            loader,
            config,
            similarity_cache: SimilarityCache::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded variant: jitter, random padding, and SVD probes all become
    /// reproducible.
    pub fn with_seed(loader: L, config: RecommendConfig, seed: u64) -> Self {
        Self {
            loader,
            config,
            similarity_cache: SimilarityCache::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produce recommendations for one user.
    ///
    /// Never raises: every internal failure degrades to a structurally valid
    /// (possibly empty) response.
    pub fn recommend(&mut self, user_id: UserId, top_n: usize) -> RecommendationResponse {
        let snapshot = match self.loader.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(user_id, error = %e, "snapshot load failed");
                return RecommendationResponse {
                    user_id,
                    recommended_gourmets: Vec::new(),
                    recommended_categories: Vec::new(),
                };
            }
        };

        let final_ids = self.run_pipeline(&snapshot, user_id, top_n);
        let recommended_categories = categories::recommend_categories(&snapshot, user_id, top_n);
        let recommended_gourmets = enrich(&snapshot, &final_ids);

        info!(
            user_id,
            gourmets = recommended_gourmets.len(),
            categories = recommended_categories.len(),
            "recommendation generated"
        );

        RecommendationResponse {
            user_id,
            recommended_gourmets,
            recommended_categories,
        }
    }

    fn run_pipeline(
        &mut self,
        snapshot: &RecommendSnapshot,
        user_id: UserId,
        top_n: usize,
    ) -> Vec<GourmetId> {
        // Empty interaction table means no similarity; CF degrades on its own.
        let similarity = self
            .similarity_cache
            .get_or_build(&snapshot.interactions, &mut self.rng);
        let ctx = RecallContext {
            snapshot,
            similarity: similarity.as_deref(),
        };

        let recall_layer = RecallLayer::new(self.config.recall_limit);
        let recall_set = recall_layer.recall_candidates(&ctx, user_id, &mut self.rng);

        let fused = FusionLayer::new(self.config.fusion.clone()).fuse(user_id, &recall_set, snapshot);

        let coarse =
            CoarseRankingLayer::new(self.config.coarse.clone()).rank(&fused, user_id, snapshot);

        RerankingLayer::new(self.config.rerank.clone()).rerank(
            &coarse,
            user_id,
            snapshot,
            top_n,
            &mut self.rng,
        )
    }
}

/// Join the final ids back onto catalog, owner, and view-count detail.
/// Ids missing from the catalog are skipped; the order is preserved and
/// duplicates collapse.
fn enrich(snapshot: &RecommendSnapshot, ids: &[GourmetId]) -> Vec<RecommendedGourmet> {
    let view_counts = snapshot.view_counts();
    let mut seen = HashSet::new();

    ids.iter()
        .filter(|id| seen.insert(**id))
        .filter_map(|id| {
            let gourmet = snapshot.gourmet(*id)?;
            let category_name = gourmet
                .category_id
                .and_then(|c| snapshot.category_name(c))
                .unwrap_or("Unknown")
                .to_owned();
            let owner = snapshot.owner(gourmet.owner_id);
            Some(RecommendedGourmet {
                id: gourmet.id.to_string(),
                title: gourmet.title.clone(),
                category_name,
                cover: gourmet.cover.clone().unwrap_or_default(),
                owner_avatar: owner
                    .and_then(|o| o.avatar.clone())
                    .unwrap_or_default(),
                owner_name: owner.map(|o| o.name.clone()).unwrap_or_default(),
                create_time: gourmet.created_at.to_rfc3339(),
                view_count: view_counts.get(&gourmet.id).copied().unwrap_or(0).to_string(),
            })
        })
        .collect()
}
