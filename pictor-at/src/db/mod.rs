//! Database access for pictor-at

pub mod assets;
pub mod queue_items;
pub mod settings;
pub mod taxonomy;

use sqlx::SqlitePool;

/// Initialize pictor-at tables
///
/// Creates the settings, queue_items, assets and taxonomy_nodes tables if
/// they don't exist.
pub async fn init_tables(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queue_items (
            id TEXT PRIMARY KEY,
            team_id TEXT NOT NULL,
            asset_id TEXT NOT NULL,
            status TEXT NOT NULL,
            matching_sources TEXT NOT NULL,
            recognition_accuracy TEXT NOT NULL,
            result TEXT,
            extra TEXT NOT NULL DEFAULT '{}',
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Duplicate checks scan by (team, asset, status)
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_queue_items_team_asset
        ON queue_items (team_id, asset_id, status)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assets (
            id TEXT PRIMARY KEY,
            team_id TEXT NOT NULL,
            name TEXT NOT NULL,
            materialized_path TEXT NOT NULL,
            description TEXT,
            existing_tags TEXT NOT NULL DEFAULT '[]',
            content_metadata TEXT NOT NULL DEFAULT 'null'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS taxonomy_nodes (
            id TEXT PRIMARY KEY,
            team_id TEXT NOT NULL,
            name TEXT NOT NULL,
            level INTEGER NOT NULL CHECK (level BETWEEN 1 AND 3),
            parent_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_taxonomy_nodes_team ON taxonomy_nodes (team_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, queue_items, assets, taxonomy_nodes)");

    Ok(())
}
