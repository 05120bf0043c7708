//! Event types for the Pictor event system
//!
//! Provides shared event definitions and EventBus for all Pictor modules.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pictor event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All events use this central enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaggingEvent {
    /// Tagging work started for a queue item
    ///
    /// Triggers:
    /// - SSE: Show per-asset tagging activity
    /// - Database: Queue item record created in processing state
    QueueItemStarted {
        /// Queue item UUID
        queue_item_id: Uuid,
        /// Team that owns the asset
        team_id: Uuid,
        /// Asset being tagged
        asset_id: Uuid,
        /// When work started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Tagging work completed for a queue item
    ///
    /// Triggers:
    /// - SSE: Refresh prediction lists for the asset
    /// - Database: Queue item marked completed with results
    QueueItemCompleted {
        /// Queue item UUID
        queue_item_id: Uuid,
        /// Asset that was tagged
        asset_id: Uuid,
        /// Number of aggregated tag predictions persisted
        prediction_count: usize,
        /// Work duration in seconds
        duration_seconds: u64,
        /// When work completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Tagging work failed for a queue item
    ///
    /// Triggers:
    /// - SSE: Show error notification
    /// - Database: Queue item marked failed with error detail
    QueueItemFailed {
        /// Queue item UUID
        queue_item_id: Uuid,
        /// Asset whose tagging failed
        asset_id: Uuid,
        /// Error message details
        error_message: String,
        /// When work failed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Batch enqueue finished (all assets examined)
    ///
    /// Triggers:
    /// - SSE: Show batch summary notification
    BatchEnqueueCompleted {
        /// Team the batch ran for
        team_id: Uuid,
        /// Number of assets examined
        total_assets: usize,
        /// Number of tagging tasks enqueued
        enqueued_tasks: usize,
        /// Number of assets that failed to enqueue
        failed_tasks: usize,
        /// When the batch finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TaggingEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            TaggingEvent::QueueItemStarted { .. } => "QueueItemStarted",
            TaggingEvent::QueueItemCompleted { .. } => "QueueItemCompleted",
            TaggingEvent::QueueItemFailed { .. } => "QueueItemFailed",
            TaggingEvent::BatchEnqueueCompleted { .. } => "BatchEnqueueCompleted",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Capacity Recommendations
///
/// - Development/Desktop: 1000
/// - Constrained deployments: 500
/// - Testing: 10-100
///
/// # Examples
///
/// ```
/// use pictor_common::events::{EventBus, TaggingEvent};
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// let event_bus = Arc::new(EventBus::new(1000));
///
/// // Subscribe to events
/// let mut rx = event_bus.subscribe();
///
/// // Emit an event
/// event_bus.emit(TaggingEvent::QueueItemStarted {
///     queue_item_id: Uuid::new_v4(),
///     team_id: Uuid::new_v4(),
///     asset_id: Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// }).ok();
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TaggingEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use pictor_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(1000);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TaggingEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TaggingEvent,
    ) -> Result<usize, broadcast::error::SendError<TaggingEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// This is useful for non-critical events where it's acceptable if
    /// no component is currently listening.
    ///
    /// # Examples
    ///
    /// ```
    /// use pictor_common::events::{EventBus, TaggingEvent};
    /// use uuid::Uuid;
    ///
    /// let event_bus = EventBus::new(100);
    ///
    /// // Progress notifications - OK if no one is listening
    /// event_bus.emit_lossy(TaggingEvent::QueueItemCompleted {
    ///     queue_item_id: Uuid::new_v4(),
    ///     asset_id: Uuid::new_v4(),
    ///     prediction_count: 4,
    ///     duration_seconds: 2,
    ///     timestamp: chrono::Utc::now(),
    /// });
    /// ```
    pub fn emit_lossy(&self, event: TaggingEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    ///
    /// Useful for debugging and monitoring
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_event() -> TaggingEvent {
        TaggingEvent::QueueItemStarted {
            queue_item_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(50);
        assert_eq!(bus.capacity(), 50);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_and_emit() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 1);
        bus.emit(started_event()).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "QueueItemStarted");
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started_event()).is_err());
    }

    #[test]
    fn test_emit_lossy_without_subscribers() {
        let bus = EventBus::new(10);
        // Must not panic or error
        bus.emit_lossy(started_event());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let count = bus.emit(started_event()).unwrap();
        assert_eq!(count, 2);

        assert_eq!(rx1.recv().await.unwrap().event_type(), "QueueItemStarted");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "QueueItemStarted");
    }

    #[test]
    fn test_event_type_method() {
        let failed = TaggingEvent::QueueItemFailed {
            queue_item_id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            error_message: "prediction call failed".to_string(),
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(failed.event_type(), "QueueItemFailed");

        let batch = TaggingEvent::BatchEnqueueCompleted {
            team_id: Uuid::new_v4(),
            total_assets: 10,
            enqueued_tasks: 8,
            failed_tasks: 2,
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(batch.event_type(), "BatchEnqueueCompleted");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_string(&started_event()).unwrap();
        assert!(json.contains("\"type\":\"QueueItemStarted\""));
        assert!(json.contains("queue_item_id"));
    }
}
