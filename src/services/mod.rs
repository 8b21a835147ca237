pub mod categories;
pub mod coarse_ranking;
pub mod fusion;
pub mod recall;
pub mod reranking;
pub mod similarity;

pub use coarse_ranking::CoarseRankingLayer;
pub use fusion::FusionLayer;
pub use recall::{RecallContext, RecallError, RecallLayer, RecallSet, RecallSource};
pub use reranking::RerankingLayer;
pub use similarity::{ItemSimilarity, SimilarityCache};
