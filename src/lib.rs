pub mod config;
pub mod models;
pub mod recommender;
pub mod services;
pub mod vocabulary;

pub use config::RecommendConfig;
pub use models::{
    Category, Gourmet, Interaction, InteractionKind, Owner, RecommendSnapshot,
    RecommendationResponse, RecommendedGourmet,
};
pub use recommender::{Recommender, SnapshotLoader};
pub use services::{CoarseRankingLayer, FusionLayer, RecallLayer, RerankingLayer, SimilarityCache};
pub use vocabulary::FeatureVocabulary;
