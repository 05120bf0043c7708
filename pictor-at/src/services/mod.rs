//! Service modules for asset tagging
//!
//! The tagging queue orchestrates the rest: taxonomy indexing, the model
//! prediction call, local keyword matching and confidence aggregation.

pub mod confidence_aggregator;
pub mod keyword_matcher;
pub mod llm_client;
pub mod tagging_queue;
pub mod taxonomy_index;

pub use confidence_aggregator::{AggregationError, ConfidenceAggregator};
pub use keyword_matcher::KeywordMatcher;
pub use llm_client::{
    OpenAiTagPredictor, PredictionOutcome, PredictionRequest, TagPredictor, TagPredictorError,
};
pub use tagging_queue::{
    AssetCatalog, BatchItemError, BatchSummary, EnqueueOptions, TaggingQueue,
};
pub use taxonomy_index::{TaxonomyEntry, TaxonomyIndex};
