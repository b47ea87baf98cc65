//! Gemini API client for AI-powered features.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-pro";

#[derive(Debug, Clone, Error)]
pub enum GeminiApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing api key: GEMINI_API_KEY environment variable not set")]
    MissingApiKey,
}

impl GeminiApiError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// The external text-generation collaborator, abstracted so services can be
/// exercised against a fake in tests.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, GeminiApiError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part { text: text.into() }],
        }
    }

    fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

/// Response from the generateContent endpoint
#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

impl GeminiResponse {
    /// Extract the text of the first candidate, if any.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
    }
}

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
    const MAX_OUTPUT_TOKENS: u32 = 4096;

    /// Create a new client using the GEMINI_API_KEY environment variable.
    /// GEMINI_MODEL overrides the default model.
    pub fn from_env() -> Result<Self, GeminiApiError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| GeminiApiError::MissingApiKey)?;
        Self::new(api_key, std::env::var("GEMINI_MODEL").ok())
    }

    /// Create a new client with the given API key
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, GeminiApiError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("issuedeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GeminiApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Send a generation request, retrying transient failures.
    pub async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<GeminiResponse, GeminiApiError> {
        let request = GeminiRequest {
            contents: vec![Content::user(prompt)],
            system_instruction: system.map(Content::system),
            generation_config: GenerationConfig {
                max_output_tokens: Self::MAX_OUTPUT_TOKENS,
            },
        };

        (|| async { self.send_request(&request).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &GeminiApiError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "Gemini API call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn send_request(&self, request: &GeminiRequest) -> Result<GeminiResponse, GeminiApiError> {
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        let res = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<GeminiResponse>()
                .await
                .map_err(|e| GeminiApiError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GeminiApiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(GeminiApiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(GeminiApiError::Http { status, body })
            }
        }
    }

    /// Send a single prompt and get the response text back.
    pub async fn ask(&self, prompt: &str, system: Option<&str>) -> Result<String, GeminiApiError> {
        let response = self.complete(prompt, system).await?;

        response
            .text()
            .map(|s| s.to_string())
            .ok_or_else(|| GeminiApiError::Serde("No text content in response".to_string()))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, GeminiApiError> {
        self.ask(prompt, system).await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> GeminiApiError {
    if e.is_timeout() {
        GeminiApiError::Timeout
    } else {
        GeminiApiError::Transport(e.to_string())
    }
}

/// Pull the JSON payload out of model output that may be wrapped in a
/// markdown fence (with or without a language tag). Unfenced text, and text
/// with an unterminated fence, is returned as-is.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    let Some(start) = text.find("```") else {
        return text;
    };

    let body = &text[start + 3..];
    // A language tag like "json" sits between the fence and the first newline.
    let body = match body.find('\n') {
        Some(i) if body[..i].chars().all(|c| c.is_ascii_alphanumeric()) => &body[i + 1..],
        _ => body,
    };

    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_passes_unfenced_text_through() {
        assert_eq!(extract_json(r#"  {"key": "value"}  "#), r#"{"key": "value"}"#);
    }

    #[test]
    fn extract_json_unwraps_labeled_fence() {
        let input = "Sure, here it is:\n```json\n[{\"id\": 1}]\n```\nLet me know.";
        assert_eq!(extract_json(input), r#"[{"id": 1}]"#);
    }

    #[test]
    fn extract_json_unwraps_bare_fence() {
        assert_eq!(extract_json("```\n{\"key\": \"value\"}\n```"), r#"{"key": "value"}"#);
    }

    #[test]
    fn extract_json_leaves_unterminated_fence_alone() {
        assert_eq!(extract_json("```json\n{\"key\": 1}"), "```json\n{\"key\": 1}");
    }

    #[test]
    fn test_response_text_first_candidate() {
        let raw = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "hello"}]}}
            ]
        }"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text(), Some("hello"));
    }

    #[test]
    fn test_response_text_no_candidates() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), None);
    }
}
