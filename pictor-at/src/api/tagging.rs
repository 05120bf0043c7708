//! Tagging queue API handlers
//!
//! POST /tagging/enqueue, POST /tagging/batch, GET /tagging/status

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{MatchingSources, QueueItem, QueueItemStatus, RecognitionAccuracy},
    services::{BatchSummary, EnqueueOptions},
    AppState,
};

/// POST /tagging/enqueue request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub asset_id: Uuid,
    #[serde(default)]
    pub matching_sources: Option<MatchingSources>,
    #[serde(default)]
    pub recognition_accuracy: Option<RecognitionAccuracy>,
    #[serde(default)]
    pub task_type: Option<String>,
}

/// POST /tagging/enqueue response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub queue_item_id: Uuid,
    pub status: QueueItemStatus,
}

/// POST /tagging/batch request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub team_id: Uuid,
    /// Explicit asset selection; omitted means the team's full listing
    #[serde(default)]
    pub asset_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

/// POST /tagging/enqueue
///
/// Accept one asset for tagging. Returns the queue item handle for status
/// polling; the prediction work itself runs in the background.
pub async fn enqueue_tagging(
    State(state): State<AppState>,
    Json(request): Json<EnqueueRequest>,
) -> ApiResult<Json<EnqueueResponse>> {
    // The asset must be known before we can scope the duplicate check to
    // its team
    let asset = crate::db::assets::load_asset(&state.db, request.asset_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Asset not found: {}", request.asset_id)))?;

    // One in-flight task per asset (409 Conflict)
    if crate::db::queue_items::has_active_item(&state.db, asset.team_id, asset.id).await? {
        return Err(ApiError::Conflict(format!(
            "Asset {} already has a tagging task in flight",
            request.asset_id
        )));
    }

    let options = EnqueueOptions {
        matching_sources: request.matching_sources,
        recognition_accuracy: request.recognition_accuracy,
        task_type: request.task_type,
    };
    let item = state.tagging_queue.enqueue(request.asset_id, options).await?;

    Ok(Json(EnqueueResponse {
        queue_item_id: item.id,
        status: item.status,
    }))
}

/// POST /tagging/batch
///
/// Enqueue many assets for one team. Per-asset failures are isolated and
/// reported in the summary; an asset with a task already in flight is
/// skipped without counting as enqueued or failed.
pub async fn enqueue_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchSummary>> {
    if request.batch_size == Some(0) {
        return Err(ApiError::BadRequest(
            "batchSize must be at least 1".to_string(),
        ));
    }

    let summary = state
        .tagging_queue
        .enqueue_batch(request.team_id, request.asset_ids, request.batch_size)
        .await?;

    Ok(Json(summary))
}

/// GET /tagging/status/{queue_item_id}
///
/// Poll one queue item. Returns the full persisted record, including
/// per-source and aggregated predictions once the item is terminal.
pub async fn get_tagging_status(
    State(state): State<AppState>,
    Path(queue_item_id): Path<Uuid>,
) -> ApiResult<Json<QueueItem>> {
    let item = crate::db::queue_items::load_queue_item(&state.db, queue_item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Queue item not found: {}", queue_item_id)))?;

    tracing::debug!(queue_item_id = %queue_item_id, status = ?item.status, "Status query");

    Ok(Json(item))
}

/// Build tagging queue routes
pub fn tagging_routes() -> Router<AppState> {
    Router::new()
        .route("/tagging/enqueue", post(enqueue_tagging))
        .route("/tagging/batch", post(enqueue_batch))
        .route("/tagging/status/:queue_item_id", get(get_tagging_status))
}
