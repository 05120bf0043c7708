//! Tagging queue service
//!
//! Coordinates one asset-tagging task from enqueue to terminal state:
//!
//! enqueue → processing → predict → validate → aggregate → {completed | failed}
//!
//! Enqueue is fire-and-forget: it persists the queue item, schedules the
//! worker on the runtime and returns immediately. Completion is observed
//! only by polling the persisted status (or the event stream). A terminal
//! write is the only write after creation, so the single worker per item
//! never races itself.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use pictor_common::events::{EventBus, TaggingEvent};

use crate::db;
use crate::models::{
    Asset, MatchingSources, PredictedTag, QueueItem, QueueItemStatus, RecognitionAccuracy,
    SourceKind, SourcePredictions, SourceScores, TagPrediction, MAX_TAXONOMY_DEPTH,
};
use crate::services::confidence_aggregator::ConfidenceAggregator;
use crate::services::keyword_matcher::KeywordMatcher;
use crate::services::llm_client::{PredictionRequest, TagPredictor};
use crate::services::taxonomy_index::TaxonomyIndex;

/// Default cap on assets handled per batch call
const DEFAULT_BATCH_SIZE: usize = 20;

/// Asset lookup seam toward the library store
///
/// `sync_asset` refreshes and returns one asset's metadata; implementations
/// decide where the metadata comes from (local table, upstream service).
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    async fn sync_asset(&self, asset_id: Uuid) -> pictor_common::Result<Asset>;

    /// All asset ids belonging to a team, stable order
    async fn list_asset_ids(&self, team_id: Uuid) -> pictor_common::Result<Vec<Uuid>>;
}

/// Per-call enqueue options; absent fields fall back to stored defaults
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub matching_sources: Option<MatchingSources>,
    pub recognition_accuracy: Option<RecognitionAccuracy>,
    pub task_type: Option<String>,
}

/// Aggregate outcome of a batch enqueue
///
/// Skipped assets (already in flight) count toward neither enqueued nor
/// failed, so `enqueued_tasks + failed_tasks <= total_assets`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_assets: usize,
    pub enqueued_tasks: usize,
    pub failed_tasks: usize,
    pub errors: Vec<BatchItemError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemError {
    pub asset_id: Uuid,
    pub error: String,
}

/// Tagging queue service
#[derive(Clone)]
pub struct TaggingQueue {
    db: SqlitePool,
    event_bus: EventBus,
    predictor: Arc<dyn TagPredictor>,
    catalog: Arc<dyn AssetCatalog>,
    aggregator: ConfidenceAggregator,
    keyword_matcher: KeywordMatcher,
}

impl TaggingQueue {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        predictor: Arc<dyn TagPredictor>,
        catalog: Arc<dyn AssetCatalog>,
    ) -> Self {
        Self {
            db,
            event_bus,
            predictor,
            catalog,
            aggregator: ConfidenceAggregator::new(),
            keyword_matcher: KeywordMatcher::new(),
        }
    }

    /// Enqueue one asset for tagging
    ///
    /// Syncs the asset, persists a `processing` queue item, schedules the
    /// prediction work and returns. The returned item is the caller's
    /// handle for status polling. Duplicate checks are the caller's job
    /// (single-item API routes return 409; the batch path skips).
    pub async fn enqueue(
        &self,
        asset_id: Uuid,
        options: EnqueueOptions,
    ) -> pictor_common::Result<QueueItem> {
        let asset = self.catalog.sync_asset(asset_id).await?;
        self.enqueue_synced(asset, options).await
    }

    async fn enqueue_synced(
        &self,
        asset: Asset,
        options: EnqueueOptions,
    ) -> pictor_common::Result<QueueItem> {
        let matching_sources = match options.matching_sources {
            Some(sources) => sources,
            None => db::settings::get_default_matching_sources(&self.db).await,
        };
        let recognition_accuracy = match options.recognition_accuracy {
            Some(accuracy) => accuracy,
            None => db::settings::get_default_recognition_accuracy(&self.db).await,
        };

        let mut item = QueueItem::new(
            asset.team_id,
            asset.id,
            matching_sources,
            recognition_accuracy,
        );
        item.extra.task_type = options.task_type;
        item.transition_to(QueueItemStatus::Processing);

        db::queue_items::save_queue_item(&self.db, &item).await?;

        self.event_bus.emit_lossy(TaggingEvent::QueueItemStarted {
            queue_item_id: item.id,
            team_id: item.team_id,
            asset_id: item.asset_id,
            timestamp: Utc::now(),
        });

        tracing::info!(
            queue_item_id = %item.id,
            asset_id = %item.asset_id,
            accuracy = %item.recognition_accuracy,
            "Tagging task enqueued"
        );

        // Fire-and-forget: errors terminate in the persisted item, never here
        let queue = self.clone();
        let worker_item = item.clone();
        tokio::spawn(async move {
            queue.run_worker(worker_item, asset).await;
        });

        Ok(item)
    }

    /// Enqueue many assets, isolating per-asset failures
    ///
    /// When `asset_ids` is absent, the team's full asset listing is used.
    /// `batch_size` caps the run either way.
    pub async fn enqueue_batch(
        &self,
        team_id: Uuid,
        asset_ids: Option<Vec<Uuid>>,
        batch_size: Option<usize>,
    ) -> pictor_common::Result<BatchSummary> {
        let limit = batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        let mut ids = match asset_ids {
            Some(ids) => ids,
            None => self.catalog.list_asset_ids(team_id).await?,
        };
        ids.truncate(limit);

        let mut summary = BatchSummary {
            total_assets: ids.len(),
            ..BatchSummary::default()
        };

        for asset_id in ids {
            let asset = match self.catalog.sync_asset(asset_id).await {
                Ok(asset) => asset,
                Err(e) => {
                    tracing::warn!(asset_id = %asset_id, error = %e, "Batch asset sync failed");
                    summary.failed_tasks += 1;
                    summary.errors.push(BatchItemError {
                        asset_id,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if asset.team_id != team_id {
                summary.failed_tasks += 1;
                summary.errors.push(BatchItemError {
                    asset_id,
                    error: "asset does not belong to the requested team".to_string(),
                });
                continue;
            }

            match db::queue_items::has_active_item(&self.db, team_id, asset_id).await {
                Ok(true) => {
                    tracing::debug!(asset_id = %asset_id, "Skipping asset with task in flight");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    summary.failed_tasks += 1;
                    summary.errors.push(BatchItemError {
                        asset_id,
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            match self.enqueue_synced(asset, EnqueueOptions::default()).await {
                Ok(_) => summary.enqueued_tasks += 1,
                Err(e) => {
                    tracing::warn!(asset_id = %asset_id, error = %e, "Batch enqueue failed");
                    summary.failed_tasks += 1;
                    summary.errors.push(BatchItemError {
                        asset_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.event_bus.emit_lossy(TaggingEvent::BatchEnqueueCompleted {
            team_id,
            total_assets: summary.total_assets,
            enqueued_tasks: summary.enqueued_tasks,
            failed_tasks: summary.failed_tasks,
            timestamp: Utc::now(),
        });

        tracing::info!(
            team_id = %team_id,
            total = summary.total_assets,
            enqueued = summary.enqueued_tasks,
            failed = summary.failed_tasks,
            "Batch enqueue completed"
        );

        Ok(summary)
    }

    /// The scheduled prediction work for one queue item
    async fn run_worker(&self, item: QueueItem, asset: Asset) {
        match self.predict_and_aggregate(&item, &asset).await {
            Ok(worker_output) => {
                let mut completed = item.clone();
                completed.extra.model = worker_output.model;
                completed.extra.usage = worker_output.usage;
                let prediction_count = worker_output.aggregated.len();
                completed.complete(worker_output.predictions, worker_output.aggregated);

                match db::queue_items::save_queue_item(&self.db, &completed).await {
                    Ok(()) => {
                        self.event_bus.emit_lossy(TaggingEvent::QueueItemCompleted {
                            queue_item_id: completed.id,
                            asset_id: completed.asset_id,
                            prediction_count,
                            duration_seconds: completed.duration_seconds(),
                            timestamp: Utc::now(),
                        });
                        tracing::info!(
                            queue_item_id = %completed.id,
                            predictions = prediction_count,
                            "Tagging task completed"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            queue_item_id = %item.id,
                            error = %e,
                            "Failed to persist completed result"
                        );
                        self.mark_failed(item, format!("Failed to persist result: {}", e))
                            .await;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(queue_item_id = %item.id, error = %e, "Tagging task failed");
                self.mark_failed(item, e.to_string()).await;
            }
        }
    }

    /// Terminal failure write with a last-resort direct update
    async fn mark_failed(&self, mut item: QueueItem, error: String) {
        item.fail(error.clone());

        if let Err(e) = db::queue_items::save_queue_item(&self.db, &item).await {
            tracing::error!(
                queue_item_id = %item.id,
                error = %e,
                "Failed to persist failed status, attempting direct write"
            );
            let _ = sqlx::query(
                "UPDATE queue_items SET status = '\"failed\"', result = ?, ended_at = ? WHERE id = ?",
            )
            .bind(serde_json::json!({ "error": error }).to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(item.id.to_string())
            .execute(&self.db)
            .await;
        }

        self.event_bus.emit_lossy(TaggingEvent::QueueItemFailed {
            queue_item_id: item.id,
            asset_id: item.asset_id,
            error_message: error,
            timestamp: Utc::now(),
        });
    }

    async fn predict_and_aggregate(
        &self,
        item: &QueueItem,
        asset: &Asset,
    ) -> anyhow::Result<WorkerOutput> {
        // Taxonomy fetch and prompt rendering
        let forest = db::taxonomy::load_team_taxonomy(&self.db, item.team_id).await?;
        let taxonomy = TaxonomyIndex::new(forest);
        let taxonomy_text = taxonomy.flatten_text();

        tracing::debug!(
            queue_item_id = %item.id,
            taxonomy_nodes = taxonomy.node_count(),
            "Loaded team taxonomy"
        );

        // One model call covers the three model-driven channels
        let outcome = self
            .predictor
            .predict(&PredictionRequest {
                asset: asset.clone(),
                taxonomy_text,
                sources: item.matching_sources,
            })
            .await?;
        let mut predictions = outcome.predictions;

        // tagKeywords is computed locally
        if item.matching_sources.tag_keywords {
            predictions.tag_keywords = self.keyword_matcher.match_asset(asset, &taxonomy);
        }

        // Schema and resolution validation; invalid entries are dropped
        for kind in SourceKind::ALL {
            predictions
                .get_mut(kind)
                .retain_mut(|tag| validate_and_normalize(tag, &taxonomy));
        }

        let aggregated = self.aggregate_predictions(
            &predictions,
            item.matching_sources,
            item.recognition_accuracy,
        )?;

        Ok(WorkerOutput {
            predictions,
            aggregated,
            model: outcome.model,
            usage: outcome.usage,
        })
    }

    /// Group per-source predictions by tag path, aggregate and threshold
    ///
    /// Repeats of the same path within one source keep the highest
    /// confidence. Disabled sources never reach the aggregator input, even
    /// when a provider returned them.
    fn aggregate_predictions(
        &self,
        predictions: &SourcePredictions,
        sources: MatchingSources,
        accuracy: RecognitionAccuracy,
    ) -> anyhow::Result<Vec<TagPrediction>> {
        let mut by_path: BTreeMap<Vec<String>, SourceScores> = BTreeMap::new();
        for kind in SourceKind::ALL {
            if !sources.is_enabled(kind) {
                continue;
            }
            for tag in predictions.get(kind) {
                let scores = by_path.entry(tag.tag_path.clone()).or_default();
                let slot = scores.entry(kind).or_insert(tag.confidence);
                if tag.confidence > *slot {
                    *slot = tag.confidence;
                }
            }
        }

        let threshold = accuracy.threshold();
        let mut aggregated = Vec::new();
        for (tag_path, scores) in by_path {
            let confidence = self.aggregator.aggregate(&scores)?;
            if confidence < threshold {
                continue;
            }
            let source_labels = SourceKind::ALL
                .into_iter()
                .filter(|kind| scores.contains_key(kind))
                .map(|kind| kind.as_str().to_string())
                .collect();
            aggregated.push(TagPrediction {
                tag_path,
                confidence,
                source_labels,
            });
        }

        aggregated.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        Ok(aggregated)
    }
}

struct WorkerOutput {
    predictions: SourcePredictions,
    aggregated: Vec<TagPrediction>,
    model: Option<String>,
    usage: Option<crate::models::TokenUsage>,
}

/// Schema check plus taxonomy resolution for one predicted tag
///
/// Accepted tags get their path segments trimmed to the canonical node
/// names and their `leaf_tag_id` replaced with the resolved node id.
fn validate_and_normalize(tag: &mut PredictedTag, taxonomy: &TaxonomyIndex) -> bool {
    if tag.tag_path.is_empty() || tag.tag_path.len() > MAX_TAXONOMY_DEPTH as usize {
        tracing::debug!(path = ?tag.tag_path, "Dropping tag with invalid path depth");
        return false;
    }
    if !tag.confidence.is_finite() || !(0.0..=1.0).contains(&tag.confidence) {
        tracing::debug!(
            path = ?tag.tag_path,
            confidence = tag.confidence,
            "Dropping tag with out-of-range confidence"
        );
        return false;
    }

    match taxonomy.resolve_path(&tag.tag_path) {
        Some(node) => {
            tag.tag_path = tag.tag_path.iter().map(|s| s.trim().to_string()).collect();
            tag.leaf_tag_id = Some(node.id.to_string());
            true
        }
        None => {
            tracing::debug!(path = ?tag.tag_path, "Dropping unresolvable tag path");
            false
        }
    }
}
