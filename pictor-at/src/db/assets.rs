//! Asset snapshot persistence and catalog access
//!
//! Synced assets are stored locally so workers operate on a stable snapshot
//! even if the upstream DAM record changes mid-flight.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use pictor_common::{Error, Result};

use crate::models::Asset;
use crate::services::AssetCatalog;

/// Save an asset snapshot (insert or replace by id)
pub async fn upsert_asset(pool: &SqlitePool, asset: &Asset) -> Result<()> {
    let id = asset.id.to_string();
    let team_id = asset.team_id.to_string();
    let existing_tags = serde_json::to_string(&asset.existing_tags)
        .map_err(|e| Error::Serialization(format!("Failed to serialize existing_tags: {}", e)))?;
    let content_metadata = serde_json::to_string(&asset.content_metadata)
        .map_err(|e| Error::Serialization(format!("Failed to serialize content_metadata: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO assets (
            id, team_id, name, materialized_path, description,
            existing_tags, content_metadata
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            team_id = excluded.team_id,
            name = excluded.name,
            materialized_path = excluded.materialized_path,
            description = excluded.description,
            existing_tags = excluded.existing_tags,
            content_metadata = excluded.content_metadata
        "#,
    )
    .bind(&id)
    .bind(&team_id)
    .bind(&asset.name)
    .bind(&asset.materialized_path)
    .bind(&asset.description)
    .bind(&existing_tags)
    .bind(&content_metadata)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load an asset snapshot by id
pub async fn load_asset(pool: &SqlitePool, asset_id: Uuid) -> Result<Option<Asset>> {
    let row = sqlx::query(
        r#"
        SELECT id, team_id, name, materialized_path, description,
               existing_tags, content_metadata
        FROM assets
        WHERE id = ?
        "#,
    )
    .bind(asset_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let team_id: String = row.get("team_id");
            let team_id = Uuid::parse_str(&team_id)
                .map_err(|e| Error::Serialization(format!("Failed to parse team_id: {}", e)))?;

            let existing_tags: String = row.get("existing_tags");
            let existing_tags: Vec<String> = serde_json::from_str(&existing_tags)
                .map_err(|e| {
                    Error::Serialization(format!("Failed to deserialize existing_tags: {}", e))
                })?;

            let content_metadata: String = row.get("content_metadata");
            let content_metadata: serde_json::Value = serde_json::from_str(&content_metadata)
                .map_err(|e| {
                    Error::Serialization(format!("Failed to deserialize content_metadata: {}", e))
                })?;

            Ok(Some(Asset {
                id: asset_id,
                team_id,
                name: row.get("name"),
                materialized_path: row.get("materialized_path"),
                description: row.get("description"),
                existing_tags,
                content_metadata,
            }))
        }
        None => Ok(None),
    }
}

/// List all asset ids belonging to a team, ordered by id for stable batches
pub async fn list_team_asset_ids(pool: &SqlitePool, team_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("SELECT id FROM assets WHERE team_id = ? ORDER BY id")
        .bind(team_id.to_string())
        .fetch_all(pool)
        .await?;

    let mut ids = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get("id");
        let id = Uuid::parse_str(&id)
            .map_err(|e| Error::Serialization(format!("Failed to parse asset id: {}", e)))?;
        ids.push(id);
    }
    Ok(ids)
}

/// Asset catalog backed by the local assets table
///
/// Stands in for the DAM sync client: `sync_asset` re-reads the stored
/// snapshot, which external ingestion keeps current via [`upsert_asset`].
#[derive(Debug, Clone)]
pub struct DbAssetCatalog {
    db: SqlitePool,
}

impl DbAssetCatalog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AssetCatalog for DbAssetCatalog {
    async fn sync_asset(&self, asset_id: Uuid) -> Result<Asset> {
        load_asset(&self.db, asset_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("asset {} not found", asset_id)))
    }

    async fn list_asset_ids(&self, team_id: Uuid) -> Result<Vec<Uuid>> {
        list_team_asset_ids(&self.db, team_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn asset(team_id: Uuid) -> Asset {
        Asset {
            id: Uuid::new_v4(),
            team_id,
            name: "brief.pdf".to_string(),
            materialized_path: "/Marketing/Briefs/".to_string(),
            description: Some("Q3 campaign brief".to_string()),
            existing_tags: vec!["campaign".to_string()],
            content_metadata: serde_json::json!({"pages": 12}),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_load_round_trip() {
        let pool = setup_test_db().await;
        let original = asset(Uuid::new_v4());
        upsert_asset(&pool, &original).await.unwrap();

        let loaded = load_asset(&pool, original.id).await.unwrap().unwrap();
        assert_eq!(loaded.team_id, original.team_id);
        assert_eq!(loaded.name, "brief.pdf");
        assert_eq!(loaded.existing_tags, vec!["campaign"]);
        assert_eq!(loaded.content_metadata["pages"], 12);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_snapshot() {
        let pool = setup_test_db().await;
        let mut snapshot = asset(Uuid::new_v4());
        upsert_asset(&pool, &snapshot).await.unwrap();

        snapshot.name = "brief-v2.pdf".to_string();
        snapshot.existing_tags.push("approved".to_string());
        upsert_asset(&pool, &snapshot).await.unwrap();

        let loaded = load_asset(&pool, snapshot.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "brief-v2.pdf");
        assert_eq!(loaded.existing_tags.len(), 2);
    }

    #[tokio::test]
    async fn test_list_team_asset_ids_scoped_to_team() {
        let pool = setup_test_db().await;
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();

        let a1 = asset(team_a);
        let a2 = asset(team_a);
        let b1 = asset(team_b);
        upsert_asset(&pool, &a1).await.unwrap();
        upsert_asset(&pool, &a2).await.unwrap();
        upsert_asset(&pool, &b1).await.unwrap();

        let ids = list_team_asset_ids(&pool, team_a).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a1.id));
        assert!(ids.contains(&a2.id));
        assert!(!ids.contains(&b1.id));
    }

    #[tokio::test]
    async fn test_catalog_sync_missing_asset_is_not_found() {
        let pool = setup_test_db().await;
        let catalog = DbAssetCatalog::new(pool);

        let err = catalog.sync_asset(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
