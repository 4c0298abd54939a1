//! Investigation - the primary public API of the engine.
//!
//! An [`Investigation`] owns one session's conversation log and case board and
//! wires them to the turn cycle and the save slots. Collaborators are
//! injected, so the same facade runs against Gemini, a scripted test double,
//! or anything else implementing [`Oracle`] and [`Synthesizer`].

use crate::case::CaseContext;
use crate::clues::Clue;
use crate::log::{ConversationLog, Turn};
use crate::oracle::{GeminiOracle, GeminiSynthesizer, Oracle, OracleConfig, Synthesizer};
use crate::orchestrator::{
    TurnConfig, TurnOrchestrator, TurnOutcome, DEFAULT_HISTORY_WINDOW, PLACEHOLDER_IMAGE,
};
use crate::persist::{
    FileSlotStore, LoadOutcome, PersistError, PersistenceManager, SaveReceipt, SlotStore,
    SlotSummary,
};
use crate::state::{lock, Phase, SessionState, SharedState};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Errors from Investigation operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Configuration for a new investigation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The case being worked.
    pub case: CaseContext,

    /// Number of recent turns the narrator sees.
    pub history_window: usize,

    /// Image reference for visual clues that could not be rendered.
    pub placeholder_image: String,

    /// Directory holding save slots.
    pub save_dir: PathBuf,

    /// Narrator model.
    pub model: Option<String>,

    /// Evidence image model.
    pub image_model: Option<String>,

    /// Narrator temperature.
    pub temperature: Option<f32>,
}

impl SessionConfig {
    /// Create a config for the given case.
    pub fn new(case: CaseContext) -> Self {
        Self {
            case,
            history_window: DEFAULT_HISTORY_WINDOW,
            placeholder_image: PLACEHOLDER_IMAGE.to_string(),
            save_dir: PathBuf::from("saves"),
            model: None,
            image_model: None,
            temperature: None,
        }
    }

    /// The built-in case with `NOIR_*` environment overrides applied.
    pub fn from_env() -> Result<Self, SessionError> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `NOIR_HISTORY_WINDOW`, `NOIR_SAVE_DIR`, `NOIR_MODEL` and
    /// `NOIR_IMAGE_MODEL` as looked up by `lookup`. Blank values are ignored.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SessionError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(window) = get("NOIR_HISTORY_WINDOW") {
            let window = window.trim().parse().map_err(|_| {
                SessionError::Config(format!(
                    "NOIR_HISTORY_WINDOW must be a number, got '{window}'"
                ))
            })?;
            self.history_window = window;
        }
        if let Some(dir) = get("NOIR_SAVE_DIR") {
            self.save_dir = PathBuf::from(dir);
        }
        if let Some(model) = get("NOIR_MODEL") {
            self.model = Some(model);
        }
        if let Some(model) = get("NOIR_IMAGE_MODEL") {
            self.image_model = Some(model);
        }

        Ok(self)
    }

    /// Set the number of turns the narrator sees.
    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    /// Set the placeholder image reference.
    pub fn with_placeholder_image(mut self, reference: impl Into<String>) -> Self {
        self.placeholder_image = reference.into();
        self
    }

    /// Set the save directory.
    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    /// Set the narrator model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the evidence image model.
    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    /// Set the narrator temperature.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            history_window: self.history_window,
            placeholder_image: self.placeholder_image.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(CaseContext::default())
    }
}

/// A detective's investigation.
///
/// Methods take `&self`: a turn in flight does not block reads of the log or
/// the board, and a second submission is rejected rather than queued.
pub struct Investigation {
    state: SharedState,
    case: Arc<CaseContext>,
    orchestrator: TurnOrchestrator,
    persistence: PersistenceManager,
}

impl Investigation {
    /// Open a fresh investigation, seeded with the case's opening narration.
    pub fn new(
        config: SessionConfig,
        oracle: Arc<dyn Oracle>,
        synthesizer: Arc<dyn Synthesizer>,
        store: Arc<dyn SlotStore>,
    ) -> Self {
        let case = Arc::new(config.case.clone());
        let state: SharedState = Arc::new(Mutex::new(SessionState::new(ConversationLog::seeded(
            case.opening_narration.clone(),
        ))));

        let orchestrator = TurnOrchestrator::new(
            Arc::clone(&state),
            oracle,
            synthesizer,
            Arc::clone(&case),
            config.turn_config(),
        );
        let persistence = PersistenceManager::new(Arc::clone(&state), store, case.id.clone());

        debug!(case = %case.id, window = config.history_window, "investigation opened");

        Self {
            state,
            case,
            orchestrator,
            persistence,
        }
    }

    /// Open an investigation backed by Gemini and file save slots.
    ///
    /// Credentials come from `GEMINI_API_KEY` (or `API_KEY`). Without one the
    /// session still runs; the assistant explains what is missing.
    pub fn with_gemini(config: SessionConfig) -> Self {
        let models = OracleConfig {
            model: config.model.clone(),
            image_model: config
                .image_model
                .clone()
                .unwrap_or_else(|| OracleConfig::default().image_model),
            temperature: config.temperature,
        };
        let synthesizer = GeminiSynthesizer::from_env().with_model(models.image_model.clone());
        let oracle = GeminiOracle::from_env().with_config(models);

        let store = FileSlotStore::new(config.save_dir.clone());
        Self::new(config, Arc::new(oracle), Arc::new(synthesizer), Arc::new(store))
    }

    /// Replace the draft input.
    pub fn set_draft(&self, text: impl Into<String>) {
        lock(&self.state).draft = text.into();
    }

    /// The current draft input.
    pub fn draft(&self) -> String {
        lock(&self.state).draft.clone()
    }

    /// Send the current draft through a turn cycle.
    pub async fn submit(&self) -> TurnOutcome {
        self.orchestrator.submit().await
    }

    /// Set the draft to `text` and send it.
    pub async fn send(&self, text: impl Into<String>) -> TurnOutcome {
        self.set_draft(text);
        self.submit().await
    }

    /// Save the log and board to `slot`.
    pub async fn save(&self, slot: u32) -> Result<SaveReceipt, SessionError> {
        Ok(self.persistence.save(slot).await?)
    }

    /// Restore the log and board from `slot`.
    pub async fn load(&self, slot: u32) -> Result<LoadOutcome, SessionError> {
        Ok(self.persistence.load(slot).await?)
    }

    /// Describe a slot without loading it.
    pub async fn peek(&self, slot: u32) -> Result<Option<SlotSummary>, SessionError> {
        Ok(self.persistence.peek(slot).await?)
    }

    /// Describe every occupied slot in `slots`.
    pub async fn list_slots(
        &self,
        slots: impl IntoIterator<Item = u32>,
    ) -> Result<Vec<SlotSummary>, SessionError> {
        Ok(self.persistence.list(slots).await?)
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> Vec<Turn> {
        lock(&self.state).log.turns().to_vec()
    }

    /// The most recent turn.
    pub fn last_turn(&self) -> Option<Turn> {
        lock(&self.state).log.last().cloned()
    }

    /// All clues, newest first.
    pub fn clues(&self) -> Vec<Clue> {
        lock(&self.state).clues.to_vec()
    }

    /// A clue by board position (1 is newest).
    pub fn clue(&self, number: usize) -> Option<Clue> {
        let index = number.checked_sub(1)?;
        lock(&self.state).clues.get(index).cloned()
    }

    /// Where the turn cycle is.
    pub fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    /// Whether a turn is in flight.
    pub fn is_busy(&self) -> bool {
        !self.phase().is_idle()
    }

    pub fn case(&self) -> &CaseContext {
        &self.case
    }

    pub fn history_window(&self) -> usize {
        self.orchestrator.config().history_window
    }
}
