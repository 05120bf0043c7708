//! Configuration resolution for pictor-at
//!
//! Provides multi-tier configuration resolution with Database → ENV → TOML
//! priority for the LLM API key.

use pictor_common::config::TomlConfig;
use pictor_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Resolve LLM API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_llm_api_key(db: &SqlitePool, toml_config: &TomlConfig) -> Result<String> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key = crate::db::settings::get_llm_api_key(db).await?;
    if let Some(key) = &db_key {
        if is_valid_key(key) {
            sources.push("database");
        }
    }

    // Tier 2: Environment variable
    let env_key = std::env::var("PICTOR_LLM_API_KEY").ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    // Tier 3: TOML config
    let toml_key = toml_config.llm_api_key.as_ref();
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "LLM API key found in multiple sources: {}. Using database (highest priority).",
            sources.join(", ")
        );
    }

    // Resolution priority
    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("LLM API key loaded from database");
            return Ok(key);
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("LLM API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("LLM API key loaded from TOML config");
            return Ok(key.clone());
        }
    }

    // No valid key found
    Err(Error::Config(
        "LLM API key not configured. Please configure using one of:\n\
         1. Web UI: http://localhost:5730/settings\n\
         2. Environment: PICTOR_LLM_API_KEY=your-key-here\n\
         3. TOML config: ~/.config/pictor/pictor-at.toml (llm_api_key = \"your-key\")\n\
         \n\
         Obtain API key at: https://platform.openai.com/api-keys"
            .to_string(),
    ))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the LLM API key at startup and auto-migrate lower-tier keys
///
/// Returns `None` when no source has a valid key; the service still starts
/// and tagging tasks fail until a key is configured. When the key came from
/// ENV or TOML, it is written back to the database (authoritative store).
pub async fn bootstrap_llm_api_key(
    db: &SqlitePool,
    toml_config: &TomlConfig,
    toml_path: &Path,
) -> Result<Option<String>> {
    let key = match resolve_llm_api_key(db, toml_config).await {
        Ok(key) => key,
        Err(e) => {
            warn!("{}", e);
            warn!("Tagging tasks will fail until an LLM API key is configured");
            return Ok(None);
        }
    };

    let db_key = crate::db::settings::get_llm_api_key(db).await?;
    let db_has_key = db_key.as_deref().map(is_valid_key).unwrap_or(false);
    if !db_has_key {
        let source = if std::env::var("PICTOR_LLM_API_KEY")
            .map(|k| is_valid_key(&k))
            .unwrap_or(false)
        {
            "environment"
        } else {
            "TOML"
        };
        migrate_key_to_database(key.clone(), source, db, toml_path).await?;
    }

    Ok(Some(key))
}

// ============================================================================
// Settings Sync and Write-Back
// ============================================================================

/// Sync settings from database to TOML file
///
/// HashMap keys: "llm_api_key", "llm_base_url", "llm_model"
pub async fn sync_settings_to_toml(
    settings: HashMap<String, String>,
    toml_path: &Path,
) -> Result<()> {
    // Read existing TOML (or use defaults)
    let mut config = if toml_path.exists() {
        let content = std::fs::read_to_string(toml_path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?
    } else {
        TomlConfig::default()
    };

    // Update fields from HashMap
    if let Some(key) = settings.get("llm_api_key") {
        config.llm_api_key = Some(key.clone());
    }
    if let Some(url) = settings.get("llm_base_url") {
        config.llm_base_url = Some(url.clone());
    }
    if let Some(model) = settings.get("llm_model") {
        config.llm_model = Some(model.clone());
    }

    // Write atomically (best-effort)
    match pictor_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
            Ok(())
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
            Ok(()) // Graceful degradation
        }
    }
}

/// Perform auto-migration from ENV/TOML to database + TOML
pub async fn migrate_key_to_database(
    key: String,
    source: &str,
    db: &SqlitePool,
    toml_path: &Path,
) -> Result<()> {
    // Write to database (authoritative)
    crate::db::settings::set_llm_api_key(db, &key).await?;

    // Write to TOML if source was ENV (backup)
    if source == "environment" {
        let mut settings = HashMap::new();
        settings.insert("llm_api_key".to_string(), key);
        sync_settings_to_toml(settings, toml_path).await?;
    }

    info!("LLM API key migrated from {} to database", source);
    Ok(())
}
