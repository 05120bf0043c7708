//! Keyword Matcher Service
//!
//! Computes the tagKeywords prediction channel locally: fuzzy matching of
//! an asset's existing tags and name tokens against taxonomy node names.
//! No model call is involved.

use crate::models::{Asset, PredictedTag};
use crate::services::taxonomy_index::TaxonomyIndex;

/// Matches asset keywords against taxonomy node names
///
/// Candidates are the asset's existing tags plus tokens split out of the
/// asset name. Each candidate is compared to every taxonomy node name with
/// Jaro-Winkler similarity; nodes whose best candidate clears the fuzzy
/// threshold become predictions with the node's full name chain as the
/// tag path.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    /// Minimum Jaro-Winkler similarity to count as a match
    fuzzy_threshold: f64,

    /// Confidence scale applied when the match came from a name token
    /// rather than an existing tag
    name_token_weight: f64,

    /// Maximum predictions returned per asset
    max_predictions: usize,
}

impl KeywordMatcher {
    pub fn new() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            name_token_weight: 0.9,
            max_predictions: 10,
        }
    }

    /// Match one asset against the taxonomy
    ///
    /// Returns at most `max_predictions` predictions, highest confidence
    /// first. One prediction per taxonomy node: when both an existing tag
    /// and a name token match the same node, the higher-scoring candidate
    /// wins.
    pub fn match_asset(&self, asset: &Asset, taxonomy: &TaxonomyIndex) -> Vec<PredictedTag> {
        let tag_candidates: Vec<String> = asset
            .existing_tags
            .iter()
            .map(|t| normalize(t))
            .filter(|t| !t.is_empty())
            .collect();
        let token_candidates: Vec<String> = tokenize(&asset.name);

        if tag_candidates.is_empty() && token_candidates.is_empty() {
            return Vec::new();
        }

        let mut predictions = Vec::new();

        for entry in taxonomy.entries() {
            let node_name = normalize(entry.path.last().map(String::as_str).unwrap_or(""));
            if node_name.is_empty() {
                continue;
            }

            let tag_sim = best_similarity(&node_name, &tag_candidates);
            let token_sim = best_similarity(&node_name, &token_candidates);
            if tag_sim.max(token_sim) < self.fuzzy_threshold {
                continue;
            }

            // Threshold gates on raw similarity; confidence additionally
            // discounts name-token matches.
            let confidence = tag_sim.max(token_sim * self.name_token_weight).min(1.0);
            tracing::debug!(
                node = %entry.path.join(" > "),
                confidence = format!("{:.3}", confidence),
                "Keyword match"
            );
            predictions.push(PredictedTag {
                tag_path: entry.path.clone(),
                confidence,
                leaf_tag_id: Some(entry.id.to_string()),
            });
        }

        predictions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        predictions.truncate(self.max_predictions);
        predictions
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase and trim for comparison
fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Split an asset name into comparable tokens
///
/// Splits on any non-alphanumeric character and drops tokens shorter than
/// three characters so file extensions and counters rarely match.
fn tokenize(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(normalize)
        .collect()
}

fn best_similarity(node_name: &str, candidates: &[String]) -> f64 {
    candidates
        .iter()
        .map(|c| strsim::jaro_winkler(node_name, c))
        .fold(0.0, f64::max)
}
