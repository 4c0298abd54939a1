//! Static case seed.
//!
//! A case is fixed for the lifetime of a session. It is never written into a
//! save slot; a restored session takes its case from configuration.

use serde::{Deserialize, Serialize};

/// The narrative seed of an investigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseContext {
    /// Case file number, stamped into every save.
    pub id: String,

    /// Case title.
    pub title: String,

    /// Where the case takes place.
    pub location: String,

    /// Background briefing, sent to the narrator with every turn.
    pub briefing: String,

    /// The assistant's opening line, seeded as the first turn of a new session.
    pub opening_narration: String,
}

impl CaseContext {
    /// The built-in case.
    pub fn swinton_manor() -> Self {
        Self {
            id: "CASE-1947-0312".to_string(),
            title: "The Swinton Manor Affair".to_string(),
            location: "Swinton Manor, on the cliffs outside Port Ellery".to_string(),
            briefing: "March 1947. Lord Edmund Swinton, shipping magnate, was found dead in \
                his locked study at Swinton Manor shortly after midnight. The fire was still \
                burning, a glass of brandy sat untouched on the desk, and the window latch \
                had been forced from the inside. Present in the house that night: his second \
                wife Vivian, his estranged son Arthur, the butler Hollis, the family physician \
                Dr. Marsh, and a house guest who signed the register only as 'Mr. Grey'. \
                The county police want it closed as a heart attack by Friday."
                .to_string(),
            opening_narration: "Rain's coming down hard tonight, detective. Everybody at \
                Swinton Manor has something to hide. I'm your assistant on this one. The scene \
                is sealed, but we need to move before those high-society secrets start to \
                turn. Where do you want to start?"
                .to_string(),
        }
    }

    /// Load a case from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for CaseContext {
    fn default() -> Self {
        Self::swinton_manor()
    }
}
