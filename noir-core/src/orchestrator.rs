//! The turn cycle.
//!
//! One submission runs `Idle -> AwaitingReply -> [MaterializingClues] -> Idle`.
//! The phase is checked and advanced under the state lock, so a second
//! submission arriving mid-cycle is turned away instead of interleaving with
//! the first. The lock is released around the two suspension points (the
//! oracle call and each synthesizer call).

use crate::case::CaseContext;
use crate::clues::Clue;
use crate::log::Turn;
use crate::oracle::{ClueDescriptor, Oracle, OracleError, OracleRequest, Synthesizer};
use crate::state::{lock, Phase, SessionState, SharedState};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Number of recent turns sent to the oracle as history.
pub const DEFAULT_HISTORY_WINDOW: usize = 6;

/// Image reference used when the synthesizer comes back empty-handed.
pub const PLACEHOLDER_IMAGE: &str = "https://picsum.photos/400/400?grayscale";

/// Tunables for the turn cycle.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// How many prior turns the oracle sees.
    pub history_window: usize,

    /// Content for visual clues the synthesizer could not render.
    pub placeholder_image: String,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            placeholder_image: PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

/// Why a submission was turned away. Nothing was recorded and the draft is intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The draft was empty or whitespace.
    EmptyInput,
    /// Another cycle is still running.
    Busy(Phase),
}

/// Result of one submission.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The oracle answered; its reply and any new clues are recorded.
    Completed {
        prompt: Turn,
        reply: Turn,
        /// New clues in materialization order (the board shows them reversed).
        clues: Vec<Clue>,
    },
    /// The oracle call failed outright. Only the detective's turn was recorded.
    Aborted { prompt: Turn, error: OracleError },
    /// Nothing happened.
    Rejected(Rejection),
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }

    /// The assistant's reply, if one was recorded.
    pub fn reply(&self) -> Option<&Turn> {
        match self {
            TurnOutcome::Completed { reply, .. } => Some(reply),
            _ => None,
        }
    }
}

/// Drives submissions through the oracle and synthesizer into the log and board.
pub struct TurnOrchestrator {
    state: SharedState,
    oracle: Arc<dyn Oracle>,
    synthesizer: Arc<dyn Synthesizer>,
    case: Arc<CaseContext>,
    config: TurnConfig,
}

impl TurnOrchestrator {
    pub(crate) fn new(
        state: SharedState,
        oracle: Arc<dyn Oracle>,
        synthesizer: Arc<dyn Synthesizer>,
        case: Arc<CaseContext>,
        config: TurnConfig,
    ) -> Self {
        Self {
            state,
            oracle,
            synthesizer,
            case,
            config,
        }
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Send the current draft.
    pub async fn submit(&self) -> TurnOutcome {
        let (_cycle, prompt, request) = match self.begin() {
            Ok(started) => started,
            Err(rejection) => {
                debug!(?rejection, "submission rejected");
                return TurnOutcome::Rejected(rejection);
            }
        };

        let reply = match self.oracle.consult(&request).await {
            Ok(reply) => reply,
            Err(error) => {
                error!(error = %error, "oracle call failed; turn aborted");
                return TurnOutcome::Aborted { prompt, error };
            }
        };

        let reply_turn = Turn::assistant(&reply.message);
        let descriptors = reply.new_clues.unwrap_or_default();
        {
            let mut state = lock(&self.state);
            state.log.append(reply_turn.clone());
            if !descriptors.is_empty() {
                state.phase = Phase::MaterializingClues;
            }
        }

        // One at a time: board order must follow proposal order.
        let mut clues = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let clue = self.materialize(descriptor).await;
            lock(&self.state).clues.insert(clue.clone());
            clues.push(clue);
        }

        info!(new_clues = clues.len(), "turn completed");

        TurnOutcome::Completed {
            prompt,
            reply: reply_turn,
            clues,
        }
    }

    /// Check the guards, echo the detective's turn and build the oracle request.
    fn begin(&self) -> Result<(CycleGuard<'_>, Turn, OracleRequest), Rejection> {
        let mut state = lock(&self.state);

        if !state.phase.is_idle() {
            return Err(Rejection::Busy(state.phase));
        }
        if state.draft.trim().is_empty() {
            return Err(Rejection::EmptyInput);
        }

        // Window is taken before the echo; the new text travels separately.
        let history = state.log.recent_window(self.config.history_window);
        let text = std::mem::take(&mut state.draft);
        let prompt = Turn::user(text.clone());
        state.log.append(prompt.clone());
        state.phase = Phase::AwaitingReply;

        debug!(history = history.len(), log_len = state.log.len(), "turn started");

        let request = OracleRequest {
            history,
            current_message: text,
            case_context: self.case.briefing.clone(),
        };

        Ok((CycleGuard { state: &self.state }, prompt, request))
    }

    async fn materialize(&self, descriptor: ClueDescriptor) -> Clue {
        let content = if descriptor.kind.is_visual() {
            match self.synthesizer.render(descriptor.synthesis_prompt()).await {
                Ok(Some(image)) if !image.is_empty() => image,
                Ok(_) => {
                    warn!(title = %descriptor.title, "no image produced; using placeholder");
                    self.config.placeholder_image.clone()
                }
                Err(e) => {
                    warn!(
                        title = %descriptor.title,
                        error = %e,
                        "image synthesis failed; using placeholder"
                    );
                    self.config.placeholder_image.clone()
                }
            }
        } else {
            descriptor.content_text.unwrap_or_default()
        };

        Clue::new(descriptor.title, descriptor.description, descriptor.kind, content)
    }
}

/// Returns the phase to `Idle` when the cycle ends, however it ends.
struct CycleGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clues::ClueKind;
    use crate::log::ConversationLog;
    use crate::oracle::OracleReply;
    use crate::testing::{ScriptedOracle, ScriptedSynthesizer};

    fn orchestrator(
        oracle: ScriptedOracle,
        synthesizer: ScriptedSynthesizer,
    ) -> (TurnOrchestrator, SharedState) {
        let state: SharedState = Arc::new(Mutex::new(SessionState::new(ConversationLog::seeded(
            "Where to, detective?",
        ))));
        let orchestrator = TurnOrchestrator::new(
            Arc::clone(&state),
            Arc::new(oracle),
            Arc::new(synthesizer),
            Arc::new(CaseContext::default()),
            TurnConfig::default(),
        );
        (orchestrator, state)
    }

    fn set_draft(state: &SharedState, text: &str) {
        lock(state).draft = text.to_string();
    }

    #[tokio::test]
    async fn test_completed_turn_records_both_sides() {
        let oracle = ScriptedOracle::new();
        oracle.push_reply(OracleReply::narration("The study smells of cigar smoke."));
        let (orch, state) = orchestrator(oracle, ScriptedSynthesizer::new());

        set_draft(&state, "Search the study");
        let outcome = orch.submit().await;

        assert!(outcome.is_completed());
        let state = lock(&state);
        assert_eq!(state.log.len(), 3);
        assert_eq!(state.log.turns()[1].text, "Search the study");
        assert_eq!(state.log.turns()[2].text, "The study smells of cigar smoke.");
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.draft.is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_draft_is_rejected_and_kept() {
        let oracle = ScriptedOracle::new();
        let (orch, state) = orchestrator(oracle.clone(), ScriptedSynthesizer::new());

        set_draft(&state, "   ");
        let outcome = orch.submit().await;

        assert!(matches!(outcome, TurnOutcome::Rejected(Rejection::EmptyInput)));
        assert_eq!(lock(&state).log.len(), 1);
        assert_eq!(lock(&state).draft, "   ");
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_busy_phase_rejects() {
        let (orch, state) = orchestrator(ScriptedOracle::new(), ScriptedSynthesizer::new());
        {
            let mut s = lock(&state);
            s.phase = Phase::MaterializingClues;
            s.draft = "Arrest the butler".to_string();
        }

        let outcome = orch.submit().await;

        assert!(matches!(
            outcome,
            TurnOutcome::Rejected(Rejection::Busy(Phase::MaterializingClues))
        ));
        assert_eq!(lock(&state).draft, "Arrest the butler");
    }

    #[tokio::test]
    async fn test_history_excludes_current_message() {
        let oracle = ScriptedOracle::new();
        oracle.push_reply(OracleReply::narration("Noted."));
        let (orch, state) = orchestrator(oracle.clone(), ScriptedSynthesizer::new());

        set_draft(&state, "Who called the police?");
        orch.submit().await;

        let request = oracle.requests().pop().unwrap();
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.history[0].text, "Where to, detective?");
        assert_eq!(request.current_message, "Who called the police?");
        assert_eq!(request.case_context, CaseContext::default().briefing);
    }

    #[tokio::test]
    async fn test_oracle_failure_keeps_user_turn_only() {
        let oracle = ScriptedOracle::new();
        oracle.push_error(OracleError::Transport("connection reset".to_string()));
        let (orch, state) = orchestrator(oracle, ScriptedSynthesizer::new());

        set_draft(&state, "Check the cellar");
        let outcome = orch.submit().await;

        assert!(matches!(outcome, TurnOutcome::Aborted { .. }));
        let state = lock(&state);
        assert_eq!(state.log.len(), 2);
        assert_eq!(state.log.last().unwrap().text, "Check the cellar");
        assert!(state.clues.is_empty());
        assert_eq!(state.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_visual_clue_uses_synthesizer_then_placeholder() {
        let oracle = ScriptedOracle::new();
        oracle.push_reply(OracleReply::with_clues(
            "Two things catch my eye.",
            vec![
                ClueDescriptor::visual(
                    ClueKind::Image,
                    "Footprint",
                    "Size ten",
                    Some("a muddy footprint".to_string()),
                ),
                ClueDescriptor::visual(ClueKind::Map, "Hallway", "Ground floor", None),
            ],
        ));
        let synth = ScriptedSynthesizer::new();
        synth.push(Some("data:image/png;base64,Zm9v".to_string()));
        synth.push(None);
        let (orch, state) = orchestrator(oracle, synth.clone());

        set_draft(&state, "Look at the floor");
        orch.submit().await;

        assert_eq!(synth.prompts(), vec!["a muddy footprint", "Hallway"]);
        let board = lock(&state).clues.to_vec();
        assert_eq!(board[0].title, "Hallway");
        assert_eq!(board[0].content, PLACEHOLDER_IMAGE);
        assert_eq!(board[1].content, "data:image/png;base64,Zm9v");
    }

    #[tokio::test]
    async fn test_text_clue_without_content_is_empty() {
        let oracle = ScriptedOracle::new();
        oracle.push_reply(OracleReply::with_clues(
            "A note.",
            vec![ClueDescriptor {
                content_text: None,
                ..ClueDescriptor::text("Blank card", "No writing", "")
            }],
        ));
        let synth = ScriptedSynthesizer::new();
        let (orch, state) = orchestrator(oracle, synth.clone());

        set_draft(&state, "Read the card");
        orch.submit().await;

        assert_eq!(lock(&state).clues.get(0).unwrap().content, "");
        assert!(synth.prompts().is_empty());
    }
}
