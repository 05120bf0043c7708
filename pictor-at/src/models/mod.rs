//! Data models for pictor-at (Asset Tagging microservice)
//!
//! - Tagging queue item state machine
//! - Tag taxonomy tree and prediction types
//! - Startup bootstrap configuration

pub mod asset;
pub mod bootstrap_config;
pub mod prediction;
pub mod queue_item;
pub mod taxonomy;

pub use asset::Asset;
pub use bootstrap_config::AtBootstrapConfig;
pub use prediction::{
    MatchingSources, PredictedTag, RecognitionAccuracy, SourceKind, SourcePredictions,
    SourceScores, TagPrediction,
};
pub use queue_item::{
    QueueItem, QueueItemExtra, QueueItemResult, QueueItemStatus, StateTransition, TokenUsage,
};
pub use taxonomy::{TagTaxonomyNode, MAX_TAXONOMY_DEPTH};
