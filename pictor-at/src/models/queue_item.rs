//! Tagging queue item state machine
//!
//! A queue item progresses `pending → processing → {completed | failed}`.
//! The terminal states are final: once a terminal status is written the
//! item is never mutated again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prediction::{MatchingSources, RecognitionAccuracy, SourcePredictions, TagPrediction};

/// Queue item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    /// Created, work not yet scheduled
    Pending,
    /// Worker running (sync, prediction, aggregation, persistence)
    Processing,
    /// Finished with per-source and aggregated predictions
    Completed,
    /// Finished with a captured error; no automatic retry
    Failed,
}

impl QueueItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueItemStatus::Completed | QueueItemStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueItemStatus::Pending => "pending",
            QueueItemStatus::Processing => "processing",
            QueueItemStatus::Completed => "completed",
            QueueItemStatus::Failed => "failed",
        }
    }
}

/// Status transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub queue_item_id: Uuid,
    pub old_status: QueueItemStatus,
    pub new_status: QueueItemStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Terminal result payload
///
/// Serialized untagged: a completed result carries prediction arrays, a
/// failed result carries the error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueueItemResult {
    Completed {
        /// Raw per-source prediction lists
        predictions: SourcePredictions,
        /// Aggregated, threshold-filtered predictions for downstream review
        aggregated: Vec<TagPrediction>,
    },
    Failed {
        /// Captured error detail
        error: String,
    },
}

/// Token usage reported by the prediction provider
///
/// Field names follow the provider wire format; missing fields read as 0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Auxiliary metadata persisted alongside the result
///
/// `usage` keeps the provider's own snake_case field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemExtra {
    /// Task type requested at enqueue (kept for audit parity)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,

    /// Model that served the prediction call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Token usage of the prediction call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// One asset-tagging unit of work
///
/// All worker state lives in the persisted record; the worker itself holds
/// no long-lived mutable state and is restartable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Unique queue item identifier
    pub id: Uuid,

    /// Team that owns the asset
    pub team_id: Uuid,

    /// Asset to tag
    pub asset_id: Uuid,

    /// Current status
    pub status: QueueItemStatus,

    /// Sources participating in aggregation for this item
    pub matching_sources: MatchingSources,

    /// Post-aggregation acceptance threshold preset
    pub recognition_accuracy: RecognitionAccuracy,

    /// Terminal result (None while pending/processing)
    pub result: Option<QueueItemResult>,

    /// Auxiliary metadata
    #[serde(default)]
    pub extra: QueueItemExtra,

    /// Item creation time
    pub started_at: DateTime<Utc>,

    /// Terminal transition time (None while pending/processing)
    pub ended_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    /// Create a new queue item for an asset
    pub fn new(
        team_id: Uuid,
        asset_id: Uuid,
        matching_sources: MatchingSources,
        recognition_accuracy: RecognitionAccuracy,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            team_id,
            asset_id,
            status: QueueItemStatus::Pending,
            matching_sources,
            recognition_accuracy,
            result: None,
            extra: QueueItemExtra::default(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new status
    ///
    /// Transitions out of a terminal status are ignored: the first terminal
    /// write wins and the item stays unchanged.
    pub fn transition_to(&mut self, new_status: QueueItemStatus) -> StateTransition {
        if self.status.is_terminal() {
            return StateTransition {
                queue_item_id: self.id,
                old_status: self.status,
                new_status: self.status,
                transitioned_at: Utc::now(),
            };
        }

        let transition = StateTransition {
            queue_item_id: self.id,
            old_status: self.status,
            new_status,
            transitioned_at: Utc::now(),
        };
        self.status = new_status;

        // Set end time for terminal states
        if new_status.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        transition
    }

    /// Mark completed with results
    ///
    /// A no-op when the item is already terminal, leaving the first
    /// terminal result in place.
    pub fn complete(&mut self, predictions: SourcePredictions, aggregated: Vec<TagPrediction>) {
        if self.status.is_terminal() {
            return;
        }
        self.transition_to(QueueItemStatus::Completed);
        self.result = Some(QueueItemResult::Completed {
            predictions,
            aggregated,
        });
    }

    /// Mark failed with an error message
    ///
    /// A no-op when the item is already terminal, leaving the first
    /// terminal result in place.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.transition_to(QueueItemStatus::Failed);
        self.result = Some(QueueItemResult::Failed {
            error: error.into(),
        });
    }

    /// Check if the item is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Seconds between creation and the terminal transition (0 while active)
    pub fn duration_seconds(&self) -> u64 {
        self.ended_at
            .map(|end| (end - self.started_at).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }
}
