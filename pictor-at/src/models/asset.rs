//! Asset snapshot model
//!
//! Each tagging invocation works on an immutable point-in-time snapshot of
//! the asset, synced from the external DAM before the work is enqueued.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time snapshot of a DAM asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier
    pub id: Uuid,

    /// Owning team
    pub team_id: Uuid,

    /// Display name (usually the file name)
    pub name: String,

    /// Folder path from the DAM, e.g. `/Marketing/Campaigns/2024/`
    pub materialized_path: String,

    /// Free-text description, if the DAM has one
    pub description: Option<String>,

    /// Tags already applied to the asset upstream
    #[serde(default)]
    pub existing_tags: Vec<String>,

    /// Raw content-analysis metadata (EXIF, transcripts, vision labels, ...)
    #[serde(default)]
    pub content_metadata: serde_json::Value,
}

impl Asset {
    /// Compact description of the asset's basic info for prediction prompts
    pub fn basic_info_text(&self) -> String {
        match &self.description {
            Some(desc) if !desc.trim().is_empty() => {
                format!("name: {}; description: {}", self.name, desc.trim())
            }
            _ => format!("name: {}", self.name),
        }
    }
}
