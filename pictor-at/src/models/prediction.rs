//! Tag prediction types
//!
//! Predictions flow through three shapes: raw per-source lists returned by
//! the prediction providers ([`PredictedTag`]), the per-source confidence
//! map fed to the aggregator ([`SourceScores`]), and the aggregated
//! per-tag-path results persisted for downstream review ([`TagPrediction`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The four fixed confidence-signal sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    /// Filename and description
    BasicInfo,
    /// Folder path the asset lives under
    MaterializedPath,
    /// Content-analysis metadata (EXIF, transcripts, vision labels)
    ContentAnalysis,
    /// Existing tags and name keywords matched against taxonomy names
    TagKeywords,
}

impl SourceKind {
    /// All source kinds in canonical order (most to least influential)
    pub const ALL: [SourceKind; 4] = [
        SourceKind::BasicInfo,
        SourceKind::MaterializedPath,
        SourceKind::ContentAnalysis,
        SourceKind::TagKeywords,
    ];

    /// Wire name, also used as the source label on aggregated predictions
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::BasicInfo => "basicInfo",
            SourceKind::MaterializedPath => "materializedPath",
            SourceKind::ContentAnalysis => "contentAnalysis",
            SourceKind::TagKeywords => "tagKeywords",
        }
    }
}

/// Per-source confidence map fed to the aggregator
///
/// A present key means the source produced a signal for the tag path;
/// an absent key means no signal (not a zero-confidence signal).
pub type SourceScores = HashMap<SourceKind, f64>;

/// One raw prediction from a single source
///
/// `leaf_tag_id` is whatever identifier the provider echoed back. Path
/// resolution against the taxonomy goes by names; the id is kept for
/// cross-reference only and is never trusted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictedTag {
    /// Tag path as names, root to leaf (1-3 segments)
    pub tag_path: Vec<String>,

    /// Source confidence in [0,1]
    pub confidence: f64,

    /// Taxonomy node id claimed by the provider, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_tag_id: Option<String>,
}

/// Per-source prediction lists, persisted on completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePredictions {
    #[serde(default)]
    pub basic_info: Vec<PredictedTag>,
    #[serde(default)]
    pub materialized_path: Vec<PredictedTag>,
    #[serde(default)]
    pub content_analysis: Vec<PredictedTag>,
    #[serde(default)]
    pub tag_keywords: Vec<PredictedTag>,
}

impl SourcePredictions {
    pub fn get(&self, kind: SourceKind) -> &[PredictedTag] {
        match kind {
            SourceKind::BasicInfo => &self.basic_info,
            SourceKind::MaterializedPath => &self.materialized_path,
            SourceKind::ContentAnalysis => &self.content_analysis,
            SourceKind::TagKeywords => &self.tag_keywords,
        }
    }

    pub fn get_mut(&mut self, kind: SourceKind) -> &mut Vec<PredictedTag> {
        match kind {
            SourceKind::BasicInfo => &mut self.basic_info,
            SourceKind::MaterializedPath => &mut self.materialized_path,
            SourceKind::ContentAnalysis => &mut self.content_analysis,
            SourceKind::TagKeywords => &mut self.tag_keywords,
        }
    }

    pub fn total_count(&self) -> usize {
        SourceKind::ALL.iter().map(|k| self.get(*k).len()).sum()
    }
}

/// One aggregated tag prediction for downstream review
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TagPrediction {
    /// Tag path as names, root to leaf (1-3 segments)
    pub tag_path: Vec<String>,

    /// Aggregated confidence in [0,1]
    pub confidence: f64,

    /// Wire names of the sources that contributed a signal
    pub source_labels: Vec<String>,
}

/// Which sources participate in aggregation
///
/// A disabled source's signal is excluded from the aggregator input even
/// when the provider returns one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingSources {
    #[serde(default = "default_enabled")]
    pub basic_info: bool,
    #[serde(default = "default_enabled")]
    pub materialized_path: bool,
    #[serde(default = "default_enabled")]
    pub content_analysis: bool,
    #[serde(default = "default_enabled")]
    pub tag_keywords: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for MatchingSources {
    fn default() -> Self {
        Self {
            basic_info: true,
            materialized_path: true,
            content_analysis: true,
            tag_keywords: true,
        }
    }
}

impl MatchingSources {
    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::BasicInfo => self.basic_info,
            SourceKind::MaterializedPath => self.materialized_path,
            SourceKind::ContentAnalysis => self.content_analysis,
            SourceKind::TagKeywords => self.tag_keywords,
        }
    }

    /// Kinds currently enabled, in canonical order
    pub fn enabled_kinds(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }
}

/// Post-aggregation acceptance threshold preset
///
/// Applied strictly after aggregation: predictions whose final confidence
/// falls below the preset's threshold are not included in the aggregated
/// result. Not part of the aggregation formula itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionAccuracy {
    /// High-precision tagging: confidence >= 0.85
    Precise,
    /// Default trade-off: confidence >= 0.60
    Balanced,
    /// Permissive tagging for recall-heavy review queues: confidence >= 0.40
    Broad,
}

impl RecognitionAccuracy {
    /// Minimum aggregated confidence a prediction needs to be kept
    pub fn threshold(&self) -> f64 {
        match self {
            RecognitionAccuracy::Precise => 0.85,
            RecognitionAccuracy::Balanced => 0.60,
            RecognitionAccuracy::Broad => 0.40,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionAccuracy::Precise => "precise",
            RecognitionAccuracy::Balanced => "balanced",
            RecognitionAccuracy::Broad => "broad",
        }
    }
}

impl Default for RecognitionAccuracy {
    fn default() -> Self {
        RecognitionAccuracy::Balanced
    }
}

impl fmt::Display for RecognitionAccuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecognitionAccuracy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "precise" => Ok(RecognitionAccuracy::Precise),
            "balanced" => Ok(RecognitionAccuracy::Balanced),
            "broad" => Ok(RecognitionAccuracy::Broad),
            other => Err(format!("unknown recognition accuracy: {}", other)),
        }
    }
}
