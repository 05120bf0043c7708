//! Queue item database operations
//!
//! Queue item status persists as its serialized JSON form (`'"processing"'`
//! including quotes), so string comparisons in SQL must quote accordingly.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use pictor_common::{Error, Result};

use crate::models::{
    MatchingSources, QueueItem, QueueItemExtra, QueueItemResult, QueueItemStatus,
    RecognitionAccuracy,
};
use crate::utils::retry_on_lock;

/// Save queue item to database (insert or update)
///
/// Uses retry_on_lock to ride out transient lock contention; the retry
/// budget comes from the `at_database_max_lock_wait_ms` setting.
pub async fn save_queue_item(pool: &SqlitePool, item: &QueueItem) -> Result<()> {
    // Prepare all data BEFORE acquiring a database connection
    let id = item.id.to_string();
    let team_id = item.team_id.to_string();
    let asset_id = item.asset_id.to_string();
    let status = serde_json::to_string(&item.status)
        .map_err(|e| Error::Serialization(format!("Failed to serialize status: {}", e)))?;
    let matching_sources = serde_json::to_string(&item.matching_sources)
        .map_err(|e| Error::Serialization(format!("Failed to serialize matching_sources: {}", e)))?;
    let recognition_accuracy = item.recognition_accuracy.to_string();
    let result = item
        .result
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Serialization(format!("Failed to serialize result: {}", e)))?;
    let extra = serde_json::to_string(&item.extra)
        .map_err(|e| Error::Serialization(format!("Failed to serialize extra: {}", e)))?;
    let started_at = item.started_at.to_rfc3339();
    let ended_at = item.ended_at.map(|dt| dt.to_rfc3339());

    // Get max lock wait time from settings (default 5000ms)
    let max_wait_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'at_database_max_lock_wait_ms'",
    )
    .fetch_optional(pool)
    .await?
    .unwrap_or(5000);

    retry_on_lock("save_queue_item", max_wait_ms as u64, || async {
        sqlx::query(
            r#"
            INSERT INTO queue_items (
                id, team_id, asset_id, status, matching_sources,
                recognition_accuracy, result, extra, started_at, ended_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                result = excluded.result,
                extra = excluded.extra,
                ended_at = excluded.ended_at
            "#,
        )
        .bind(&id)
        .bind(&team_id)
        .bind(&asset_id)
        .bind(&status)
        .bind(&matching_sources)
        .bind(&recognition_accuracy)
        .bind(&result)
        .bind(&extra)
        .bind(&started_at)
        .bind(&ended_at)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    })
    .await
}

/// Load queue item from database
pub async fn load_queue_item(pool: &SqlitePool, queue_item_id: Uuid) -> Result<Option<QueueItem>> {
    let row = sqlx::query(
        r#"
        SELECT id, team_id, asset_id, status, matching_sources,
               recognition_accuracy, result, extra, started_at, ended_at
        FROM queue_items
        WHERE id = ?
        "#,
    )
    .bind(queue_item_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let team_id: String = row.get("team_id");
            let team_id = Uuid::parse_str(&team_id)
                .map_err(|e| Error::Serialization(format!("Failed to parse team_id: {}", e)))?;

            let asset_id: String = row.get("asset_id");
            let asset_id = Uuid::parse_str(&asset_id)
                .map_err(|e| Error::Serialization(format!("Failed to parse asset_id: {}", e)))?;

            let status: String = row.get("status");
            let status: QueueItemStatus = serde_json::from_str(&status)
                .map_err(|e| Error::Serialization(format!("Failed to deserialize status: {}", e)))?;

            let matching_sources: String = row.get("matching_sources");
            let matching_sources: MatchingSources = serde_json::from_str(&matching_sources)
                .map_err(|e| {
                    Error::Serialization(format!("Failed to deserialize matching_sources: {}", e))
                })?;

            let recognition_accuracy: String = row.get("recognition_accuracy");
            let recognition_accuracy: RecognitionAccuracy =
                recognition_accuracy.parse().map_err(|e| {
                    Error::Serialization(format!("Failed to parse recognition_accuracy: {}", e))
                })?;

            let result: Option<String> = row.get("result");
            let result: Option<QueueItemResult> = result
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| Error::Serialization(format!("Failed to deserialize result: {}", e)))?;

            let extra: String = row.get("extra");
            let extra: QueueItemExtra = serde_json::from_str(&extra)
                .map_err(|e| Error::Serialization(format!("Failed to deserialize extra: {}", e)))?;

            let started_at: String = row.get("started_at");
            let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
                .map_err(|e| Error::Serialization(format!("Failed to parse started_at: {}", e)))?
                .with_timezone(&chrono::Utc);

            let ended_at: Option<String> = row.get("ended_at");
            let ended_at = ended_at
                .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
                .transpose()
                .map_err(|e| Error::Serialization(format!("Failed to parse ended_at: {}", e)))?
                .map(|dt| dt.with_timezone(&chrono::Utc));

            Ok(Some(QueueItem {
                id: queue_item_id,
                team_id,
                asset_id,
                status,
                matching_sources,
                recognition_accuracy,
                result,
                extra,
                started_at,
                ended_at,
            }))
        }
        None => Ok(None),
    }
}

/// Check whether a non-terminal queue item exists for the (team, asset) pair
///
/// Read-before-write duplicate prevention. Inherently racy under truly
/// concurrent enqueues; the race is accepted (worst case is redundant work
/// on independent items).
pub async fn has_active_item(pool: &SqlitePool, team_id: Uuid, asset_id: Uuid) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM queue_items
        WHERE team_id = ? AND asset_id = ?
          AND status NOT IN ('"completed"', '"failed"')
        "#,
    )
    .bind(team_id.to_string())
    .bind(asset_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Mark leftover non-terminal queue items as failed on startup
///
/// A queue item not in a terminal state at service start belongs to a
/// previous run; its worker died with the process and the item would stay
/// `processing` forever.
pub async fn cleanup_stale_items(pool: &SqlitePool) -> Result<usize> {
    let ended_at = chrono::Utc::now().to_rfc3339();
    let result_json =
        serde_json::json!({ "error": "Tagging interrupted by service restart" }).to_string();

    let result = sqlx::query(
        r#"
        UPDATE queue_items
        SET status = '"failed"',
            result = ?,
            ended_at = ?
        WHERE status NOT IN ('"completed"', '"failed"')
        "#,
    )
    .bind(&result_json)
    .bind(&ended_at)
    .execute(pool)
    .await?;

    let count = result.rows_affected() as usize;
    if count > 0 {
        tracing::info!(count, "Marked stale queue items as failed");
    }
    Ok(count)
}
