//! Team taxonomy loading
//!
//! Taxonomy nodes are stored flat (one row per node); this module rebuilds
//! the level 1..=3 forest that path resolution works against.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use pictor_common::{Error, Result};

use crate::models::TagTaxonomyNode;

/// Load a team's taxonomy forest from the flat node table
///
/// Nodes whose parent row is missing are dropped with a warning rather
/// than failing the whole load; a partially maintained taxonomy should
/// not block tagging.
pub async fn load_team_taxonomy(pool: &SqlitePool, team_id: Uuid) -> Result<Vec<TagTaxonomyNode>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, level, parent_id
        FROM taxonomy_nodes
        WHERE team_id = ?
        "#,
    )
    .bind(team_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut level1: Vec<TagTaxonomyNode> = Vec::new();
    let mut level2: Vec<TagTaxonomyNode> = Vec::new();
    let mut level3: Vec<TagTaxonomyNode> = Vec::new();

    for row in rows {
        let id: String = row.get("id");
        let id = Uuid::parse_str(&id)
            .map_err(|e| Error::Serialization(format!("Failed to parse taxonomy node id: {}", e)))?;

        let parent_id: Option<String> = row.get("parent_id");
        let parent_id = parent_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| Error::Serialization(format!("Failed to parse taxonomy parent id: {}", e)))?;

        let level: i64 = row.get("level");
        let node = TagTaxonomyNode {
            id,
            name: row.get("name"),
            level: level as u8,
            parent_id,
            children: Vec::new(),
        };

        match level {
            1 => level1.push(node),
            2 => level2.push(node),
            3 => level3.push(node),
            other => {
                tracing::warn!(
                    node_id = %id,
                    level = other,
                    "Dropping taxonomy node with out-of-range level"
                );
            }
        }
    }

    // Deepest level first so children are in place before their parents move
    attach_children(&mut level2, level3);
    attach_children(&mut level1, level2);

    Ok(level1)
}

fn attach_children(parents: &mut [TagTaxonomyNode], children: Vec<TagTaxonomyNode>) {
    for child in children {
        let parent = child
            .parent_id
            .and_then(|pid| parents.iter_mut().find(|p| p.id == pid));
        match parent {
            Some(parent) => parent.children.push(child),
            None => {
                tracing::warn!(
                    node_id = %child.id,
                    name = %child.name,
                    level = child.level,
                    "Dropping orphaned taxonomy node"
                );
            }
        }
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

    async fn insert_node(
        pool: &SqlitePool,
        team_id: Uuid,
        name: &str,
        level: i64,
        parent_id: Option<Uuid>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO taxonomy_nodes (id, team_id, name, level, parent_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(team_id.to_string())
        .bind(name)
        .bind(level)
        .bind(parent_id.map(|p| p.to_string()))
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn test_load_rebuilds_three_level_forest() {
        let pool = setup_test_db().await;
        let team_id = Uuid::new_v4();

        let marketing = insert_node(&pool, team_id, "Marketing", 1, None).await;
        let campaigns = insert_node(&pool, team_id, "Campaigns", 2, Some(marketing)).await;
        insert_node(&pool, team_id, "Spring Launch", 3, Some(campaigns)).await;
        insert_node(&pool, team_id, "Engineering", 1, None).await;

        let forest = load_team_taxonomy(&pool, team_id).await.unwrap();
        assert_eq!(forest.len(), 2);

        let marketing_node = forest.iter().find(|n| n.name == "Marketing").unwrap();
        assert_eq!(marketing_node.children.len(), 1);
        assert_eq!(marketing_node.children[0].name, "Campaigns");
        assert_eq!(marketing_node.children[0].children[0].name, "Spring Launch");
    }

    #[tokio::test]
    async fn test_load_is_scoped_to_team() {
        let pool = setup_test_db().await;
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();

        insert_node(&pool, team_a, "Marketing", 1, None).await;
        insert_node(&pool, team_b, "Legal", 1, None).await;

        let forest = load_team_taxonomy(&pool, team_a).await.unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].name, "Marketing");
    }

    #[tokio::test]
    async fn test_orphaned_nodes_are_dropped() {
        let pool = setup_test_db().await;
        let team_id = Uuid::new_v4();

        insert_node(&pool, team_id, "Marketing", 1, None).await;
        // Parent id that matches no row
        insert_node(&pool, team_id, "Lost", 2, Some(Uuid::new_v4())).await;

        let forest = load_team_taxonomy(&pool, team_id).await.unwrap();
        assert_eq!(forest.len(), 1);
        assert!(forest[0].children.is_empty());
    }

    #[tokio::test]
    async fn test_empty_team_yields_empty_forest() {
        let pool = setup_test_db().await;
        let forest = load_team_taxonomy(&pool, Uuid::new_v4()).await.unwrap();
        assert!(forest.is_empty());
    }
}
