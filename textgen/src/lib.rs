//! Minimal client for an Anthropic-style text generation API.
//!
//! This crate provides the boundary between the continuity engine and
//! the external text service:
//! - [`TextGenerator`], the trait every caller programs against
//! - [`GenerationRequest`], a builder for a single generation call
//! - [`Client`], an HTTP implementation over the messages API

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Errors that can occur when calling the text service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A single generation call: one prompt in, one text body out.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    pub model: Option<String>,
}

impl GenerationRequest {
    /// Create a request with the given user prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: 4096,
            temperature: None,
            model: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// The text-service collaborator.
///
/// Implementations must return the full generated text body, or a
/// [`GenerationError`]. Callers that expect structured output are
/// responsible for tolerating malformed text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// HTTP client for the messages API.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl Client {
    /// Create a new client with the given API key.
    ///
    /// Panics only if the underlying HTTP client cannot be constructed,
    /// which indicates a broken TLS backend rather than bad input.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from the TEXTGEN_API_KEY environment variable.
    pub fn from_env() -> Result<Self, GenerationError> {
        let api_key = std::env::var("TEXTGEN_API_KEY").map_err(|_| GenerationError::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn build_headers(&self) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| GenerationError::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_api_request(&self, request: &GenerationRequest) -> ApiRequest {
        ApiRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl TextGenerator for Client {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let api_request = self.build_api_request(&request);
        let headers = self.build_headers()?;

        let response = self
            .http
            .post(format!("{}/messages", self.api_base))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, "text service returned an error");
            return Err(GenerationError::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        Ok(api_response.text())
    }
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
}

impl ApiResponse {
    /// Concatenate all text blocks in the response.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ApiContent::Text { text } => Some(text.as_str()),
                ApiContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Client::new("test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_client_with_model() {
        let client = Client::new("test-key").with_model("small-model");
        assert_eq!(client.model, "small-model");
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("Extract facts")
            .with_system("You are a story analyst")
            .with_max_tokens(1000)
            .with_temperature(0.3);

        assert_eq!(request.max_tokens, 1000);
        assert!(request.system.is_some());
        assert_eq!(request.temperature, Some(0.3));
    }

    #[test]
    fn test_api_request_uses_client_model_by_default() {
        let client = Client::new("test-key").with_model("small-model");
        let api_request = client.build_api_request(&GenerationRequest::new("hi"));
        assert_eq!(api_request.model, "small-model");

        let api_request =
            client.build_api_request(&GenerationRequest::new("hi").with_model("big-model"));
        assert_eq!(api_request.model, "big-model");
    }

    #[test]
    fn test_response_text_concatenation() {
        let response: ApiResponse = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "part one"}, {"type": "text", "text": " part two"}]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "part one part two");
    }
}
