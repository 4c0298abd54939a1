//! Gemini-backed oracle and synthesizer.

use super::{Oracle, OracleError, OracleReply, OracleRequest, SynthesisError, Synthesizer};
use async_trait::async_trait;
use gemini::{Blob, Content, Gemini, GenerationConfig, Request};
use serde_json::{error::Category, json};
use tracing::{debug, warn};

const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const EVIDENCE_PHOTO_PREFIX: &str = "A gritty 1940s forensic evidence photo: ";

const MISSING_KEY_NOTICE: &str = "[System error] No API key detected. Set GEMINI_API_KEY \
    in the environment and restart the investigation.";
const INVALID_KEY_NOTICE: &str = "[Key revoked] The API key was rejected, possibly flagged \
    as leaked. Generate a new key, update the environment and restart.";
const QUOTA_NOTICE: &str = "Detective, the free quota has run dry and I can't get at the \
    files right now. Give it a minute and try again.";
const NETWORK_NOTICE: &str = "[Connection failed] Can't reach the AI server. Check the \
    network connection and any proxy settings.";

/// Model settings for the Gemini collaborators.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Narrator model; the client default when `None`.
    pub model: Option<String>,

    /// Model used for evidence images.
    pub image_model: String,

    /// Sampling temperature for the narrator.
    pub temperature: Option<f32>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: None,
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            temperature: None,
        }
    }
}

/// The assistant, played by a Gemini model in JSON mode.
pub struct GeminiOracle {
    client: Option<Gemini>,
    config: OracleConfig,
}

impl GeminiOracle {
    pub fn new(client: Gemini) -> Self {
        Self {
            client: Some(client),
            config: OracleConfig::default(),
        }
    }

    /// Build from the environment. Without a key every turn is answered with
    /// a notice explaining how to configure one.
    pub fn from_env() -> Self {
        match Gemini::from_env() {
            Ok(client) => Self::new(client),
            Err(_) => {
                warn!("no Gemini API key configured; narrator will answer with a notice");
                Self::unconfigured()
            }
        }
    }

    /// An oracle with no credentials.
    pub fn unconfigured() -> Self {
        Self {
            client: None,
            config: OracleConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OracleConfig) -> Self {
        self.config = config;
        self
    }

    fn build_request(&self, request: &OracleRequest) -> Request {
        let mut contents: Vec<Content> = request
            .history
            .iter()
            .map(|entry| Content::with_role(entry.role.as_str(), &entry.text))
            .collect();

        contents.push(Content::user(format!(
            "[Current case background]\n{}\n\n[Detective's latest action]\n{}",
            request.case_context, request.current_message
        )));

        let mut generation = GenerationConfig::json(reply_schema());
        if let Some(temp) = self.config.temperature {
            generation = generation.with_temperature(temp);
        }

        let mut api_request = Request::new(contents)
            .with_system(include_str!("prompts/narrator.txt"))
            .with_config(generation);

        if let Some(ref model) = self.config.model {
            api_request = api_request.with_model(model);
        }

        api_request
    }
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn consult(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        let Some(ref client) = self.client else {
            return Ok(OracleReply::narration(MISSING_KEY_NOTICE));
        };

        debug!(history = request.history.len(), "consulting narrator");

        let response = match client.generate(self.build_request(request)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "narrator call failed");
                return Ok(OracleReply::narration(notice_for(&e)));
            }
        };

        let text = response.text();
        if text.trim().is_empty() {
            warn!(finish_reason = ?response.finish_reason, "narrator returned an empty reply");
            return Ok(OracleReply::narration(crackle("empty reply")));
        }

        match OracleReply::from_json(&text) {
            Ok(reply) => Ok(reply),
            // Well-formed JSON with the wrong shape, such as a reply without `message`.
            Err(e) if e.classify() == Category::Data => Err(OracleError::Malformed(e.to_string())),
            Err(e) => {
                warn!(error = %e, "narrator reply was not JSON");
                Ok(OracleReply::narration(crackle(&e.to_string())))
            }
        }
    }
}

/// Evidence photographs from a Gemini image model.
pub struct GeminiSynthesizer {
    client: Option<Gemini>,
    model: String,
}

impl GeminiSynthesizer {
    pub fn new(client: Gemini) -> Self {
        Self {
            client: Some(client),
            model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Build from the environment. Without a key no image is ever produced.
    pub fn from_env() -> Self {
        Self {
            client: Gemini::from_env().ok(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_request(&self, prompt: &str) -> Request {
        Request::new(vec![Content::user(format!("{EVIDENCE_PHOTO_PREFIX}{prompt}"))])
            .with_model(&self.model)
            .with_config(GenerationConfig::image("1:1"))
    }
}

#[async_trait]
impl Synthesizer for GeminiSynthesizer {
    async fn render(&self, prompt: &str) -> Result<Option<String>, SynthesisError> {
        let Some(ref client) = self.client else {
            return Ok(None);
        };

        let response = client
            .generate(self.build_request(prompt))
            .await
            .map_err(|e| SynthesisError(e.to_string()))?;

        Ok(response.first_inline_data().map(Blob::to_data_uri))
    }
}

/// The notice shown in place of a reply when the narrator call fails.
fn notice_for(error: &gemini::Error) -> String {
    if error.is_invalid_key() {
        INVALID_KEY_NOTICE.to_string()
    } else if error.is_rate_limited() {
        QUOTA_NOTICE.to_string()
    } else if error.is_network() {
        NETWORK_NOTICE.to_string()
    } else if matches!(error, gemini::Error::NoApiKey) {
        MISSING_KEY_NOTICE.to_string()
    } else {
        crackle(&error.to_string())
    }
}

fn crackle(detail: &str) -> String {
    format!("Sorry, detective. The line crackled: {detail}")
}

fn reply_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "message": { "type": "STRING" },
            "newClues": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "type": { "type": "STRING", "enum": ["text", "image", "map"] },
                        "contentPrompt": { "type": "STRING" },
                        "contentText": { "type": "STRING" }
                    },
                    "required": ["title", "description", "type"]
                }
            }
        },
        "required": ["message"]
    })
}
