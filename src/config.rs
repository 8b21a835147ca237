use serde::Deserialize;

/// Pipeline tunables.
///
/// Defaults reproduce the production constants. The fusion rank-decay slope,
/// the coarse-ranking quartile boosts, and the reranking weight profiles are
/// heuristics with no derivation behind them; they live here as tunables
/// rather than hard-coded law.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// Per-strategy recall depth before fusion.
    pub recall_limit: usize,
    pub fusion: FusionConfig,
    pub coarse: CoarseRankingConfig,
    pub rerank: RerankingConfig,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            recall_limit: 400,
            fusion: FusionConfig::default(),
            coarse: CoarseRankingConfig::default(),
            rerank: RerankingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub cf_weight: f64,
    pub cb_weight: f64,
    pub pop_weight: f64,
    /// Per-source candidate cap before scoring.
    pub per_source_cap: usize,
    /// Fused candidates kept after the negative-feedback filter.
    pub fused_limit: usize,
    /// Historical item ids re-surfaced after fusion.
    pub history_sample: usize,
    /// Interactions scored below this are negative feedback.
    pub negative_threshold: f64,
    /// Rank decay slope: score = weight × (1 − slope × idx / len).
    pub rank_decay: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            cf_weight: 0.6,
            cb_weight: 0.2,
            pop_weight: 0.2,
            per_source_cap: 100,
            fused_limit: 50,
            history_sample: 10,
            negative_threshold: 2.0,
            rank_decay: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoarseRankingConfig {
    pub output_limit: usize,
    pub category_weight: f64,
    /// Long-tail boost below the 25th view-count percentile.
    pub low_view_boost: f64,
    /// Boost between the 25th and 75th percentiles.
    pub mid_view_boost: f64,
    /// Per-item interaction score is capped here after averaging.
    pub interaction_score_cap: f64,
    /// Logistic decay rate: 1 / (1 + rate × age_days).
    pub time_decay_rate: f64,
}

impl Default for CoarseRankingConfig {
    fn default() -> Self {
        Self {
            output_limit: 200,
            category_weight: 0.2,
            low_view_boost: 1.3,
            mid_view_boost: 1.1,
            interaction_score_cap: 10.0,
            time_decay_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RerankingConfig {
    /// Freshness decay: exp(−rate × age_days).
    pub freshness_decay: f64,
    /// Multiplicative jitter half-width; scores are scaled by
    /// [1 − jitter, 1 + jitter].
    pub jitter: f64,
    /// Minimum distinct categories the greedy pass tries to reach.
    pub diversity_floor: usize,
}

impl Default for RerankingConfig {
    fn default() -> Self {
        Self {
            freshness_decay: 0.0036,
            jitter: 0.05,
            diversity_floor: 3,
        }
    }
}
