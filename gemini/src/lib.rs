//! Minimal Google Gemini API client.
//!
//! This crate provides a focused client for the `generateContent` endpoint with:
//! - Multi-turn text conversations with a system instruction
//! - JSON response mode with a response schema
//! - Inline image replies from image-capable models

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Errors that can occur when using the Gemini client.
#[derive(Debug, Error)]
pub enum Error {
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

impl Error {
    /// The request was refused because the quota or rate limit was hit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::Api { status: 429, .. })
    }

    /// The key was rejected, either as malformed or as revoked after a leak report.
    pub fn is_invalid_key(&self) -> bool {
        match self {
            Error::Api { status, message } => {
                *status == 401
                    || *status == 403
                    || message.contains("API key not valid")
                    || message.contains("reported as leaked")
            }
            _ => false,
        }
    }

    /// The service could not be reached at all.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

/// Gemini API client.
#[derive(Clone)]
pub struct Gemini {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Gemini {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: API_BASE.to_string(),
        }
    }

    /// Create a client from `GEMINI_API_KEY`, falling back to `API_KEY`.
    ///
    /// Empty values and the literal string `undefined` count as unset.
    pub fn from_env() -> Result<Self, Error> {
        API_KEY_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|key| !key.trim().is_empty() && key != "undefined")
            .map(Self::new)
            .ok_or(Error::NoApiKey)
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The model used when a request does not name one.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a `generateContent` request and return the full response.
    pub async fn generate(&self, request: Request) -> Result<Response, Error> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let api_request = build_api_request(request);
        let headers = self.build_headers()?;

        tracing::debug!(
            model = %model,
            contents = api_request.contents.len(),
            "gemini generateContent"
        );

        let response = self
            .client
            .post(format!("{}/models/{model}:generateContent", self.base_url))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: extract_error_message(&body),
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(parse_response(api_response))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }
}

fn build_api_request(request: Request) -> ApiRequest {
    ApiRequest {
        contents: request.contents,
        system_instruction: request.system.map(|text| Content {
            role: None,
            parts: vec![Part::text(text)],
        }),
        generation_config: request.config,
    }
}

fn parse_response(api_response: ApiResponse) -> Response {
    let candidate = api_response.candidates.into_iter().next();
    let (parts, finish_reason) = match candidate {
        Some(c) => (
            c.content.map(|content| content.parts).unwrap_or_default(),
            c.finish_reason,
        ),
        None => (Vec::new(), None),
    };

    Response {
        parts,
        finish_reason,
        usage: api_response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        }),
    }
}

/// Pull `error.message` out of a Gemini error body, or return the body as-is.
fn extract_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// ============================================================================
// Public types
// ============================================================================

/// A `generateContent` request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub model: Option<String>,
    pub system: Option<String>,
    pub contents: Vec<Content>,
    pub config: Option<GenerationConfig>,
}

impl Request {
    /// Create a new request with the given conversation contents.
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// One turn of conversation content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user turn with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role("user", text)
    }

    /// Create a model turn with text content.
    pub fn model(text: impl Into<String>) -> Self {
        Self::with_role("model", text)
    }

    /// Create a text turn with an explicit role string.
    pub fn with_role(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            parts: vec![Part::text(text)],
        }
    }
}

/// A part of a content turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    /// Parts this client does not interpret (thought signatures, function calls).
    Other(serde_json::Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Extract text from a text part.
    pub fn as_text(&self) -> Option<&str> {
        if let Part::Text { text } = self {
            Some(text)
        } else {
            None
        }
    }

    /// Extract binary payload from an inline data part.
    pub fn as_inline_data(&self) -> Option<&Blob> {
        if let Part::InlineData { inline_data } = self {
            Some(inline_data)
        } else {
            None
        }
    }
}

/// Base64 encoded binary content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    /// Render as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Generation parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

impl GenerationConfig {
    /// Ask for a JSON reply matching `schema`.
    pub fn json(schema: serde_json::Value) -> Self {
        Self {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema),
            ..Self::default()
        }
    }

    /// Ask for an image with the given aspect ratio, e.g. `"1:1"`.
    pub fn image(aspect_ratio: impl Into<String>) -> Self {
        Self {
            image_config: Some(ImageConfig {
                aspect_ratio: aspect_ratio.into(),
            }),
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Image generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
}

/// A completion response from Gemini (first candidate only).
#[derive(Debug, Clone)]
pub struct Response {
    pub parts: Vec<Part>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl Response {
    /// Get all text content concatenated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// The first inline binary part, if any.
    pub fn first_inline_data(&self) -> Option<&Blob> {
        self.parts.iter().find_map(Part::as_inline_data)
    }
}

/// Token usage information.
#[derive(Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub output_tokens: usize,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    usage_metadata: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}
