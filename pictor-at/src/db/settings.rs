//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).
//! All settings are global to the module (not user-specific).

use sqlx::SqlitePool;
use std::str::FromStr;

use pictor_common::{Error, Result};

use crate::models::{MatchingSources, RecognitionAccuracy};

/// Setting key for the LLM API key
const LLM_API_KEY: &str = "llm_api_key";

/// Setting key for the default matching source toggles (stored as JSON)
const DEFAULT_MATCHING_SOURCES: &str = "at_default_matching_sources";

/// Setting key for the default recognition accuracy preset
const DEFAULT_RECOGNITION_ACCURACY: &str = "at_default_recognition_accuracy";

/// Get LLM API key from database
pub async fn get_llm_api_key(db: &SqlitePool) -> Result<Option<String>> {
    get_setting::<String>(db, LLM_API_KEY).await
}

/// Set LLM API key in database
pub async fn set_llm_api_key(db: &SqlitePool, api_key: &str) -> Result<()> {
    set_setting(db, LLM_API_KEY, api_key.to_string()).await
}

/// Get the default matching sources for enqueues that don't specify them
///
/// Falls back to all sources enabled when the setting is absent or
/// unreadable; a broken stored default must not block enqueues.
pub async fn get_default_matching_sources(db: &SqlitePool) -> MatchingSources {
    match get_setting::<String>(db, DEFAULT_MATCHING_SOURCES).await {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(sources) => sources,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Invalid stored default matching sources, using built-in default"
                );
                MatchingSources::default()
            }
        },
        Ok(None) => MatchingSources::default(),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to read default matching sources, using built-in default"
            );
            MatchingSources::default()
        }
    }
}

/// Set the default matching sources
pub async fn set_default_matching_sources(
    db: &SqlitePool,
    sources: &MatchingSources,
) -> Result<()> {
    let json = serde_json::to_string(sources)
        .map_err(|e| Error::Serialization(format!("Failed to serialize matching sources: {}", e)))?;
    set_setting(db, DEFAULT_MATCHING_SOURCES, json).await
}

/// Get the default recognition accuracy for enqueues that don't specify one
///
/// Falls back to `balanced` when the setting is absent or unreadable.
pub async fn get_default_recognition_accuracy(db: &SqlitePool) -> RecognitionAccuracy {
    match get_setting::<RecognitionAccuracy>(db, DEFAULT_RECOGNITION_ACCURACY).await {
        Ok(Some(accuracy)) => accuracy,
        Ok(None) => RecognitionAccuracy::Balanced,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to read default recognition accuracy, using balanced"
            );
            RecognitionAccuracy::Balanced
        }
    }
}

/// Set the default recognition accuracy
pub async fn set_default_recognition_accuracy(
    db: &SqlitePool,
    accuracy: RecognitionAccuracy,
) -> Result<()> {
    set_setting(db, DEFAULT_RECOGNITION_ACCURACY, accuracy).await
}

/// Generic setting getter
///
/// Returns None if key doesn't exist in database.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &SqlitePool, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &SqlitePool, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
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

    #[tokio::test]
    async fn test_generic_setting_get_set() {
        let db = setup_test_db().await;

        // Set an integer setting
        set_setting(&db, "test_int", 42).await.unwrap();
        let value: Option<i32> = get_setting(&db, "test_int").await.unwrap();
        assert_eq!(value, Some(42));

        // Set a string setting
        set_setting(&db, "test_str", "hello".to_string())
            .await
            .unwrap();
        let value: Option<String> = get_setting(&db, "test_str").await.unwrap();
        assert_eq!(value, Some("hello".to_string()));

        // Non-existent key should return None
        let value: Option<String> = get_setting(&db, "nonexistent").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_setting_update() {
        let db = setup_test_db().await;

        set_setting(&db, "test_key", "value1".to_string())
            .await
            .unwrap();
        let value: Option<String> = get_setting(&db, "test_key").await.unwrap();
        assert_eq!(value, Some("value1".to_string()));

        // Update value (should use UPSERT)
        set_setting(&db, "test_key", "value2".to_string())
            .await
            .unwrap();
        let value: Option<String> = get_setting(&db, "test_key").await.unwrap();
        assert_eq!(value, Some("value2".to_string()));
    }

    #[tokio::test]
    async fn test_parse_failure_is_config_error() {
        let db = setup_test_db().await;

        set_setting(&db, "test_int", "not a number".to_string())
            .await
            .unwrap();
        let result = get_setting::<i32>(&db, "test_int").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_llm_api_key_get_set() {
        let db = setup_test_db().await;

        let key = get_llm_api_key(&db).await.unwrap();
        assert_eq!(key, None);

        set_llm_api_key(&db, "sk-test-123").await.unwrap();
        let key = get_llm_api_key(&db).await.unwrap();
        assert_eq!(key, Some("sk-test-123".to_string()));
    }

    #[tokio::test]
    async fn test_default_recognition_accuracy_round_trip() {
        let db = setup_test_db().await;

        // Absent setting falls back to balanced
        let accuracy = get_default_recognition_accuracy(&db).await;
        assert_eq!(accuracy, RecognitionAccuracy::Balanced);

        set_default_recognition_accuracy(&db, RecognitionAccuracy::Precise)
            .await
            .unwrap();
        let accuracy = get_default_recognition_accuracy(&db).await;
        assert_eq!(accuracy, RecognitionAccuracy::Precise);
    }

    #[tokio::test]
    async fn test_default_recognition_accuracy_bad_value_falls_back() {
        let db = setup_test_db().await;

        set_setting(&db, DEFAULT_RECOGNITION_ACCURACY, "ultra".to_string())
            .await
            .unwrap();
        let accuracy = get_default_recognition_accuracy(&db).await;
        assert_eq!(accuracy, RecognitionAccuracy::Balanced);
    }

    #[tokio::test]
    async fn test_default_matching_sources_round_trip() {
        let db = setup_test_db().await;

        // Absent setting falls back to everything enabled
        let sources = get_default_matching_sources(&db).await;
        assert!(sources.basic_info && sources.tag_keywords);

        let custom = MatchingSources {
            basic_info: true,
            materialized_path: false,
            content_analysis: true,
            tag_keywords: false,
        };
        set_default_matching_sources(&db, &custom).await.unwrap();
        let sources = get_default_matching_sources(&db).await;
        assert_eq!(sources, custom);
    }

    #[tokio::test]
    async fn test_default_matching_sources_bad_json_falls_back() {
        let db = setup_test_db().await;

        set_setting(&db, DEFAULT_MATCHING_SOURCES, "{broken".to_string())
            .await
            .unwrap();
        let sources = get_default_matching_sources(&db).await;
        assert_eq!(sources, MatchingSources::default());
    }
}
