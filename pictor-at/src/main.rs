//! pictor-at - Asset Tagger Microservice
//!
//! **Module Identity:**
//! - Name: pictor-at (Asset Tagger)
//! - Port: 5730
//!
//! Predicts tags for DAM assets against the owning team's taxonomy and
//! persists reviewable per-source and aggregated suggestions.
//!
//! Integrates with the rest of Pictor via HTTP REST + SSE.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pictor_common::events::EventBus;

// Use library definitions
use pictor_at::db::assets::DbAssetCatalog;
use pictor_at::models::AtBootstrapConfig;
use pictor_at::services::{OpenAiTagPredictor, TaggingQueue};
use pictor_at::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting pictor-at (Asset Tagger) microservice");
    info!("Port: 5730");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve root folder
    let resolver = pictor_common::config::RootFolderResolver::new("asset-tagger");
    let root_folder = resolver.resolve();

    // Step 2: Create root folder directory if missing
    let initializer = pictor_common::config::RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let bootstrap = AtBootstrapConfig::from_database(&db_path).await?;
    let db_pool = bootstrap.create_pool(&db_path).await?;
    pictor_at::db::init_tables(&db_pool).await?;
    info!("Database connection established");

    // Step 4: Fail queue items left over from a previous run
    let swept = pictor_at::db::queue_items::cleanup_stale_items(&db_pool).await?;
    if swept > 0 {
        warn!("Recovered from unclean shutdown: {} stale tasks marked failed", swept);
    }

    // Step 5: LLM credentials (Database -> ENV -> TOML)
    let toml_config = pictor_common::config::load_module_toml("pictor-at")?;
    let toml_path = pictor_common::config::module_toml_path("pictor-at")?;
    let api_key =
        pictor_at::config::bootstrap_llm_api_key(&db_pool, &toml_config, &toml_path).await?;

    let predictor = OpenAiTagPredictor::new(
        toml_config.llm_base_url.clone(),
        api_key,
        toml_config.llm_model.clone(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to build prediction client: {}", e))?;

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(100); // 100 event capacity
    info!("Event bus initialized");

    let tagging_queue = TaggingQueue::new(
        db_pool.clone(),
        event_bus.clone(),
        Arc::new(predictor),
        Arc::new(DbAssetCatalog::new(db_pool.clone())),
    );

    // Create application state
    let state = AppState::new(db_pool, event_bus, tagging_queue);

    // Build router
    let app = pictor_at::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("127.0.0.1:5730").await?;
    info!("Listening on http://127.0.0.1:5730");
    info!("Health check: http://127.0.0.1:5730/health");

    axum::serve(listener, app).await?;

    Ok(())
}
