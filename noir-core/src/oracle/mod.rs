//! External collaborators of the turn cycle.
//!
//! The [`Oracle`] writes the assistant's replies and proposes clues; the
//! [`Synthesizer`] paints evidence photos and maps. Both are injected into
//! the session, so tests can swap in the scripted doubles from
//! [`crate::testing`].

mod remote;

pub use remote::{GeminiOracle, GeminiSynthesizer, OracleConfig};

use crate::clues::ClueKind;
use crate::log::HistoryEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures the oracle could not turn into a narrative notice.
///
/// Quota, credential and connectivity problems are not errors at this level:
/// the oracle answers with an explanatory [`OracleReply`] instead.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle transport failed: {0}")]
    Transport(String),

    #[error("Oracle reply was malformed: {0}")]
    Malformed(String),
}

/// Failures while producing an image.
#[derive(Debug, Error)]
#[error("Image synthesis failed: {0}")]
pub struct SynthesisError(pub String);

/// Everything the oracle sees for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    /// Recent turns, before the current message.
    pub history: Vec<HistoryEntry>,
    /// What the detective just said.
    pub current_message: String,
    /// The case briefing.
    pub case_context: String,
}

/// A clue the oracle wants added to the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClueDescriptor {
    pub title: String,
    pub description: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: ClueKind,
    /// Prompt for the synthesizer (image and map clues).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_prompt: Option<String>,
    /// Literal content (text clues).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_text: Option<String>,
}

impl ClueDescriptor {
    pub fn text(
        title: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: ClueKind::Text,
            content_prompt: None,
            content_text: Some(content.into()),
        }
    }

    /// An image or map clue. `prompt` falls back to the title when absent.
    pub fn visual(
        kind: ClueKind,
        title: impl Into<String>,
        description: impl Into<String>,
        prompt: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind,
            content_prompt: prompt,
            content_text: None,
        }
    }

    /// The prompt to hand the synthesizer.
    pub fn synthesis_prompt(&self) -> &str {
        self.content_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.title)
    }
}

/// The oracle's structured answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleReply {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_clues: Option<Vec<ClueDescriptor>>,
}

impl OracleReply {
    /// A reply with narration only.
    pub fn narration(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            new_clues: None,
        }
    }

    /// A reply that proposes clues.
    pub fn with_clues(message: impl Into<String>, clues: Vec<ClueDescriptor>) -> Self {
        Self {
            message: message.into(),
            new_clues: Some(clues),
        }
    }

    /// Parse the oracle's JSON reply.
    ///
    /// Text that is not JSON fails with a syntax or EOF error; JSON without
    /// `message` fails with a data error.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn clues(&self) -> &[ClueDescriptor] {
        self.new_clues.as_deref().unwrap_or_default()
    }
}

/// Writes the assistant's side of the conversation.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Answer one turn. Retries and timeouts are the implementation's business.
    async fn consult(&self, request: &OracleRequest) -> Result<OracleReply, OracleError>;
}

/// Produces evidence images from text prompts.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Returns an image reference, or `None` when no image could be made.
    async fn render(&self, prompt: &str) -> Result<Option<String>, SynthesisError>;
}

/// A synthesizer that never produces anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSynthesizer;

#[async_trait]
impl Synthesizer for NoSynthesizer {
    async fn render(&self, _prompt: &str) -> Result<Option<String>, SynthesisError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::error::Category;

    #[test]
    fn test_reply_from_json() {
        let reply = OracleReply::from_json(
            r#"{
                "message": "The butler is lying.",
                "newClues": [
                    {
                        "title": "Muddy boots",
                        "description": "By the back door",
                        "type": "image",
                        "contentPrompt": "muddy boots on tiles"
                    },
                    {
                        "title": "Alibi",
                        "description": "Hollis's statement",
                        "type": "text",
                        "contentText": "I was in the pantry."
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(reply.message, "The butler is lying.");
        assert_eq!(reply.clues().len(), 2);
        assert_eq!(reply.clues()[0].kind, ClueKind::Image);
        assert_eq!(reply.clues()[1].content_text.as_deref(), Some("I was in the pantry."));
    }

    #[test]
    fn test_reply_without_clues() {
        let reply = OracleReply::from_json(r#"{"message": "Nothing here."}"#).unwrap();
        assert!(reply.clues().is_empty());

        let reply = OracleReply::from_json(r#"{"message": "Nothing.", "newClues": null}"#).unwrap();
        assert!(reply.clues().is_empty());
    }

    #[test]
    fn test_reply_parse_failures_are_classified() {
        let err = OracleReply::from_json(r#"{"newClues": []}"#).unwrap_err();
        assert_eq!(err.classify(), Category::Data);

        let err = OracleReply::from_json("{\"message\": \"cut off").unwrap_err();
        assert_eq!(err.classify(), Category::Eof);

        let err = OracleReply::from_json("Sorry detective, {not json").unwrap_err();
        assert_eq!(err.classify(), Category::Syntax);
    }

    #[test]
    fn test_descriptor_accepts_kind_alias() {
        let json = r#"{"title": "Plan", "description": "Ground floor", "kind": "map"}"#;
        let d: ClueDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.kind, ClueKind::Map);
    }

    #[test]
    fn test_synthesis_prompt_falls_back_to_title() {
        let d = ClueDescriptor::visual(ClueKind::Image, "Broken latch", "Forced inward", None);
        assert_eq!(d.synthesis_prompt(), "Broken latch");

        let d = ClueDescriptor::visual(ClueKind::Image, "Broken latch", "", Some("  ".to_string()));
        assert_eq!(d.synthesis_prompt(), "Broken latch");

        let d = ClueDescriptor::visual(
            ClueKind::Image,
            "Broken latch",
            "",
            Some("close-up of a brass window latch".to_string()),
        );
        assert_eq!(d.synthesis_prompt(), "close-up of a brass window latch");
    }
}
