//! LLM prediction client
//!
//! Tag prediction over any OpenAI-compatible chat completions API. One
//! call per queue item covers the basicInfo, materializedPath and
//! contentAnalysis channels; tagKeywords is computed locally by the
//! keyword matcher and never sent to the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{
    Asset, MatchingSources, PredictedTag, SourceKind, SourcePredictions, TokenUsage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const USER_AGENT: &str = "Pictor/0.1.0 (https://github.com/pictor/pictor)";
const RATE_LIMIT_MS: u64 = 200; // 5 requests per second toward the provider
const REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Prediction client errors
#[derive(Debug, Error)]
pub enum TagPredictorError {
    #[error("LLM API key not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Input for one prediction call
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub asset: Asset,

    /// Taxonomy rendered by [`TaxonomyIndex::flatten_text`]
    ///
    /// [`TaxonomyIndex::flatten_text`]: crate::services::TaxonomyIndex::flatten_text
    pub taxonomy_text: String,

    /// Channel toggles for this run; disabled channels are not requested
    pub sources: MatchingSources,
}

/// Output of one prediction call
#[derive(Debug, Clone, Default)]
pub struct PredictionOutcome {
    /// Per-channel predictions; only requested channels are populated
    pub predictions: SourcePredictions,

    /// Model that served the call, when the provider reports one
    pub model: Option<String>,

    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

/// Provider-agnostic tag prediction interface
///
/// Implementations cover the three model-driven channels. The outcome must
/// leave disabled channels empty even when the underlying provider returns
/// them anyway.
#[async_trait]
pub trait TagPredictor: Send + Sync {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionOutcome, TagPredictorError>;

    /// Provider name for logging/diagnostics
    fn name(&self) -> &str;
}

/// Rate limiter toward the prediction provider
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Prediction rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// The JSON document the model is instructed to produce
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionPayload {
    #[serde(default)]
    basic_info: Vec<PredictedTag>,
    #[serde(default)]
    materialized_path: Vec<PredictedTag>,
    #[serde(default)]
    content_analysis: Vec<PredictedTag>,
}

/// OpenAI-compatible chat completions predictor
///
/// Works with any endpoint speaking the chat completions protocol with
/// `response_format: json_object` support.
pub struct OpenAiTagPredictor {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiTagPredictor {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Result<Self, TagPredictorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TagPredictorError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[async_trait]
impl TagPredictor for OpenAiTagPredictor {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionOutcome, TagPredictorError> {
        let categories = requested_categories(&request.sources);
        if categories.is_empty() {
            return Ok(PredictionOutcome::default());
        }

        // The hosted default endpoint always needs a key; custom endpoints
        // (local providers) may run without one
        if self.api_key.is_none() && self.base_url == DEFAULT_BASE_URL {
            return Err(TagPredictorError::NotConfigured);
        }

        // Rate limit
        self.rate_limiter.wait().await;

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(build_system_prompt(&categories)),
                ChatMessage::user(build_user_prompt(&request.asset, &request.taxonomy_text)),
            ],
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
            temperature: DEFAULT_TEMPERATURE,
        };

        tracing::debug!(
            asset_id = %request.asset.id,
            model = %self.model,
            categories = categories.len(),
            "Requesting tag predictions"
        );

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                TagPredictorError::Timeout
            } else {
                TagPredictorError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();

        if status == 401 {
            return Err(TagPredictorError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TagPredictorError::ApiError(status.as_u16(), error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| TagPredictorError::ParseError(e.to_string()))?;

        let content = completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| TagPredictorError::ParseError("no content in response".to_string()))?;

        let payload: PredictionPayload = serde_json::from_str(&content)
            .map_err(|e| TagPredictorError::ParseError(format!("prediction JSON: {}", e)))?;

        // Disabled channels stay empty even if the model returned them
        let mut predictions = SourcePredictions::default();
        if request.sources.basic_info {
            predictions.basic_info = payload.basic_info;
        }
        if request.sources.materialized_path {
            predictions.materialized_path = payload.materialized_path;
        }
        if request.sources.content_analysis {
            predictions.content_analysis = payload.content_analysis;
        }

        tracing::info!(
            asset_id = %request.asset.id,
            predictions = predictions.total_count(),
            model = completion.model.as_deref().unwrap_or(&self.model),
            "Tag prediction successful"
        );

        Ok(PredictionOutcome {
            predictions,
            model: completion.model.or_else(|| Some(self.model.clone())),
            usage: completion.usage,
        })
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

/// Model-driven channels enabled for this run (tagKeywords never counts)
fn requested_categories(sources: &MatchingSources) -> Vec<SourceKind> {
    [
        SourceKind::BasicInfo,
        SourceKind::MaterializedPath,
        SourceKind::ContentAnalysis,
    ]
    .into_iter()
    .filter(|k| sources.is_enabled(*k))
    .collect()
}

fn build_system_prompt(categories: &[SourceKind]) -> String {
    let mut category_lines = String::new();
    for kind in categories {
        let meaning = match kind {
            SourceKind::BasicInfo => "tags suggested by the asset name and description",
            SourceKind::MaterializedPath => "tags suggested by the folder path",
            SourceKind::ContentAnalysis => "tags suggested by the content metadata",
            SourceKind::TagKeywords => continue,
        };
        category_lines.push_str(&format!("- {}: {}\n", kind.as_str(), meaning));
    }

    format!(
        "You are a digital asset tagging assistant. Given asset information and a team's \
         tag taxonomy, suggest matching tags per information source.\n\
         Respond with a single JSON object containing exactly these keys:\n{category_lines}\
         Each key maps to an array of objects of the form \
         {{\"tagPath\": [\"level 1 name\", ...], \"confidence\": 0.0-1.0, \"leafTagId\": \"id\"}} \
         where tagPath lists 1 to 3 names from the taxonomy root down and leafTagId is the id \
         shown in the taxonomy listing for the final name.\n\
         Only use tag names that appear in the taxonomy. Omit a tag rather than guessing. \
         Do not include any text outside the JSON object."
    )
}

fn build_user_prompt(asset: &Asset, taxonomy_text: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("Asset:\n");
    prompt.push_str(&format!("- name: {}\n", asset.name));
    if let Some(description) = &asset.description {
        prompt.push_str(&format!("- description: {}\n", description));
    }
    prompt.push_str(&format!("- folder path: {}\n", asset.materialized_path));
    if !asset.content_metadata.is_null() {
        prompt.push_str(&format!("- content metadata: {}\n", asset.content_metadata));
    }
    prompt.push_str("\nTag taxonomy:\n");
    prompt.push_str(taxonomy_text);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn asset() -> Asset {
        Asset {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            name: "spring-banner.png".to_string(),
            materialized_path: "/marketing/2024".to_string(),
            description: Some("Hero banner for spring campaign".to_string()),
            existing_tags: vec![],
            content_metadata: serde_json::json!({"width": 1920}),
        }
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(200);
        assert_eq!(limiter.min_interval, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(200);

        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait().await;
        }
        let elapsed = start.elapsed();

        // Two waits of ~200ms each
        assert!(elapsed >= Duration::from_millis(380));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn test_client_creation() {
        let client = OpenAiTagPredictor::new(None, Some("test-key".to_string()), None);
        assert!(client.is_ok());

        let client = client.unwrap();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.name(), "openai-compatible");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAiTagPredictor::new(
            Some("http://localhost:11434/v1/".to_string()),
            None,
            Some("llama3".to_string()),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:11434/v1");
    }

    #[tokio::test]
    async fn test_predict_without_key_on_default_endpoint_is_not_configured() {
        let client = OpenAiTagPredictor::new(None, None, None).unwrap();
        let request = PredictionRequest {
            asset: asset(),
            taxonomy_text: String::new(),
            sources: MatchingSources::default(),
        };

        let err = client.predict(&request).await.unwrap_err();
        assert!(matches!(err, TagPredictorError::NotConfigured));
    }

    #[tokio::test]
    async fn test_predict_keywords_only_skips_model_entirely() {
        // No key, no endpoint reachable; nothing is requested so nothing fails
        let client = OpenAiTagPredictor::new(None, None, None).unwrap();
        let request = PredictionRequest {
            asset: asset(),
            taxonomy_text: String::new(),
            sources: MatchingSources {
                basic_info: false,
                materialized_path: false,
                content_analysis: false,
                tag_keywords: true,
            },
        };

        let outcome = client.predict(&request).await.unwrap();
        assert_eq!(outcome.predictions.total_count(), 0);
        assert!(outcome.model.is_none());
    }

    #[test]
    fn test_requested_categories_respect_toggles() {
        let all = MatchingSources::default();
        assert_eq!(requested_categories(&all).len(), 3);

        let partial = MatchingSources {
            content_analysis: false,
            ..MatchingSources::default()
        };
        let categories = requested_categories(&partial);
        assert_eq!(categories.len(), 2);
        assert!(!categories.contains(&SourceKind::ContentAnalysis));

        // tagKeywords alone requests nothing from the model
        let keywords_only = MatchingSources {
            basic_info: false,
            materialized_path: false,
            content_analysis: false,
            tag_keywords: true,
        };
        assert!(requested_categories(&keywords_only).is_empty());
    }

    #[test]
    fn test_system_prompt_lists_only_enabled_categories() {
        let partial = MatchingSources {
            content_analysis: false,
            ..MatchingSources::default()
        };
        let prompt = build_system_prompt(&requested_categories(&partial));

        assert!(prompt.contains("basicInfo"));
        assert!(prompt.contains("materializedPath"));
        assert!(!prompt.contains("contentAnalysis"));
        assert!(!prompt.contains("tagKeywords"));
    }

    #[test]
    fn test_user_prompt_includes_asset_and_taxonomy() {
        let prompt = build_user_prompt(&asset(), "Level 1 tags:\n- Marketing (id: x)\n");

        assert!(prompt.contains("spring-banner.png"));
        assert!(prompt.contains("Hero banner"));
        assert!(prompt.contains("/marketing/2024"));
        assert!(prompt.contains("\"width\":1920"));
        assert!(prompt.contains("- Marketing (id: x)"));
    }

    #[test]
    fn test_request_serializes_json_object_format() {
        let body = ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::system("s"), ChatMessage::user("u")],
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
            temperature: 0.2,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn test_payload_parse_defaults_missing_categories() {
        let payload: PredictionPayload = serde_json::from_str(
            r#"{"basicInfo": [{"tagPath": ["Marketing", "Banner"], "confidence": 0.9}]}"#,
        )
        .unwrap();

        assert_eq!(payload.basic_info.len(), 1);
        assert_eq!(payload.basic_info[0].tag_path, vec!["Marketing", "Banner"]);
        assert!(payload.basic_info[0].leaf_tag_id.is_none());
        assert!(payload.materialized_path.is_empty());
        assert!(payload.content_analysis.is_empty());
    }

    #[test]
    fn test_payload_parse_rejects_malformed_document() {
        let result = serde_json::from_str::<PredictionPayload>("not json at all");
        assert!(result.is_err());

        let result =
            serde_json::from_str::<PredictionPayload>(r#"{"basicInfo": [{"confidence": 0.9}]}"#);
        // tagPath is mandatory on every predicted tag
        assert!(result.is_err());
    }
}
