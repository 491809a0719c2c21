use std::env;

use async_trait::async_trait;
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// A single text part of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One turn in the shape the generateContent endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// Sampling parameters sent with every call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

/// Failures of a completion call.
///
/// The two safety variants render with the `ERR_BLOCKED_BY_SAFETY` and
/// `ERR_SAFETY_CATEGORY` signals, which the proxy recognises in the error
/// text.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Failed to reach Gemini API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gemini API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode Gemini API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("ERR_BLOCKED_BY_SAFETY: the prompt was blocked ({reason})")]
    PromptBlocked { reason: String },

    #[error("ERR_SAFETY_CATEGORY: the response was stopped for {categories}")]
    SafetyCategory { categories: String },

    #[error("Gemini API returned no text (finish reason: {finish_reason})")]
    EmptyResponse { finish_reason: String },
}

/// A text-completion service that continues a conversation.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Send `message` as the next user turn after `history` and return the reply text.
    async fn send_message(
        &self,
        history: &[Content],
        message: &str,
        config: &GenerationConfig,
    ) -> Result<String, UpstreamError>;
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| eyre!("GEMINI_API_KEY environment variable not set"))?;

        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionApi for GeminiClient {
    async fn send_message(
        &self,
        history: &[Content],
        message: &str,
        config: &GenerationConfig,
    ) -> Result<String, UpstreamError> {
        // Key travels as a header; reqwest errors print the request URL.
        let api_url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let mut contents = history.to_vec();
        contents.push(Content::text("user", message));

        let request_body = json!({
            "contents": contents,
            "generationConfig": config,
        });

        debug!(
            "Sending request to Gemini API: {}",
            serde_json::to_string_pretty(&request_body)?
        );

        let response = self.client.post(&api_url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            error!("API request failed with response: {}", body);
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: Value = response.json().await?;
        debug!(
            "Received response from Gemini API: {}",
            serde_json::to_string_pretty(&response_json)?
        );

        extract_text(serde_json::from_value(response_json)?)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SafetyRating {
    category: String,
    probability: Option<String>,
    #[serde(default)]
    blocked: bool,
}

impl SafetyRating {
    fn is_flagged(&self) -> bool {
        self.blocked || matches!(self.probability.as_deref(), Some("MEDIUM") | Some("HIGH"))
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, UpstreamError> {
    if let Some(reason) = response.prompt_feedback.and_then(|feedback| feedback.block_reason) {
        return Err(UpstreamError::PromptBlocked { reason });
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(UpstreamError::EmptyResponse {
            finish_reason: "NO_CANDIDATES".to_string(),
        });
    };

    let finish_reason = candidate
        .finish_reason
        .unwrap_or_else(|| "FINISH_REASON_UNSPECIFIED".to_string());

    if finish_reason == "SAFETY" {
        let flagged: Vec<&str> = candidate
            .safety_ratings
            .iter()
            .filter(|rating| rating.is_flagged())
            .map(|rating| rating.category.as_str())
            .collect();
        let categories = if flagged.is_empty() {
            "an unspecified safety category".to_string()
        } else {
            flagged.join(", ")
        };
        return Err(UpstreamError::SafetyCategory { categories });
    }

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.is_empty() {
        return Err(UpstreamError::EmptyResponse { finish_reason });
    }

    Ok(text)
}
