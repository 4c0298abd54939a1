//! Testing utilities for investigations.
//!
//! This module provides tools for integration testing:
//! - `ScriptedOracle` and `ScriptedSynthesizer` for deterministic turns without API calls
//! - `TestHarness` for scripted investigation scenarios
//! - Assertion helpers for verifying the log and the board

use crate::clues::Clue;
use crate::log::{Role, Turn};
use crate::oracle::{
    ClueDescriptor, Oracle, OracleError, OracleReply, OracleRequest, SynthesisError, Synthesizer,
};
use crate::orchestrator::TurnOutcome;
use crate::persist::MemorySlotStore;
use crate::session::{Investigation, SessionConfig};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct OracleScript {
    replies: Mutex<VecDeque<Result<OracleReply, OracleError>>>,
    requests: Mutex<Vec<OracleRequest>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

/// An oracle that answers from a queue.
///
/// Clones share the same queue, so a test can keep a handle after passing the
/// oracle into an investigation. When the queue runs dry it answers with a
/// fixed line.
#[derive(Clone, Default)]
pub struct ScriptedOracle {
    script: Arc<OracleScript>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply.
    pub fn push_reply(&self, reply: OracleReply) {
        guard(&self.script.replies).push_back(Ok(reply));
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: OracleError) {
        guard(&self.script.replies).push_back(Err(error));
    }

    /// Hold every consultation until the returned handle is notified.
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *guard(&self.script.gate) = Some(Arc::clone(&notify));
        notify
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<OracleRequest> {
        guard(&self.script.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        guard(&self.script.requests).len()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn consult(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        guard(&self.script.requests).push(request.clone());

        let gate = guard(&self.script.gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        guard(&self.script.replies)
            .pop_front()
            .unwrap_or_else(|| Ok(OracleReply::narration("The assistant has nothing more to say.")))
    }
}

#[derive(Default)]
struct SynthesizerScript {
    results: Mutex<VecDeque<Result<Option<String>, SynthesisError>>>,
    prompts: Mutex<Vec<String>>,
}

/// A synthesizer that answers from a queue and records its prompts.
///
/// When the queue runs dry it produces nothing.
#[derive(Clone, Default)]
pub struct ScriptedSynthesizer {
    script: Arc<SynthesizerScript>,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result: an image reference, or `None` for "no image".
    pub fn push(&self, image: Option<String>) {
        guard(&self.script.results).push_back(Ok(image));
    }

    /// Queue a failure.
    pub fn push_error(&self, message: impl Into<String>) {
        guard(&self.script.results).push_back(Err(SynthesisError(message.into())));
    }

    /// Every prompt seen so far.
    pub fn prompts(&self) -> Vec<String> {
        guard(&self.script.prompts).clone()
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn render(&self, prompt: &str) -> Result<Option<String>, SynthesisError> {
        guard(&self.script.prompts).push(prompt.to_string());
        guard(&self.script.results).pop_front().unwrap_or(Ok(None))
    }
}

/// Test harness for running investigation scenarios.
pub struct TestHarness {
    /// The investigation under test.
    pub investigation: Investigation,
    /// The oracle feeding it.
    pub oracle: ScriptedOracle,
    /// The synthesizer feeding it.
    pub synthesizer: ScriptedSynthesizer,
    /// The save slots.
    pub store: Arc<MemorySlotStore>,
}

impl TestHarness {
    /// A harness on the built-in case.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_store(config, MemorySlotStore::new())
    }

    /// A harness saving into the given store.
    pub fn with_store(config: SessionConfig, store: MemorySlotStore) -> Self {
        let oracle = ScriptedOracle::new();
        let synthesizer = ScriptedSynthesizer::new();
        let store = Arc::new(store);
        let investigation = Investigation::new(
            config,
            Arc::new(oracle.clone()),
            Arc::new(synthesizer.clone()),
            store.clone(),
        );

        Self {
            investigation,
            oracle,
            synthesizer,
            store,
        }
    }

    /// Queue a narration-only reply.
    pub fn expect_reply(&mut self, text: impl Into<String>) -> &mut Self {
        self.oracle.push_reply(OracleReply::narration(text));
        self
    }

    /// Queue a reply proposing clues.
    pub fn expect_clues(
        &mut self,
        text: impl Into<String>,
        clues: Vec<ClueDescriptor>,
    ) -> &mut Self {
        self.oracle.push_reply(OracleReply::with_clues(text, clues));
        self
    }

    /// Queue a transport failure.
    pub fn expect_failure(&mut self, message: impl Into<String>) -> &mut Self {
        self.oracle.push_error(OracleError::Transport(message.into()));
        self
    }

    /// Queue a synthesizer result.
    pub fn expect_image(&mut self, image: Option<&str>) -> &mut Self {
        self.synthesizer.push(image.map(str::to_string));
        self
    }

    /// Send detective input and run the turn.
    pub async fn input(&self, text: &str) -> TurnOutcome {
        self.investigation.send(text).await
    }

    pub fn log_len(&self) -> usize {
        self.investigation.turns().len()
    }

    pub fn last_turn(&self) -> Option<Turn> {
        self.investigation.last_turn()
    }

    /// Board titles, newest first.
    pub fn clue_titles(&self) -> Vec<String> {
        self.investigation.clues().into_iter().map(|c| c.title).collect()
    }

    pub fn clue_by_title(&self, title: &str) -> Option<Clue> {
        self.investigation
            .clues()
            .into_iter()
            .find(|c| c.title == title)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the log holds exactly `expected` turns.
#[track_caller]
pub fn assert_log_len(harness: &TestHarness, expected: usize) {
    let actual = harness.log_len();
    assert_eq!(actual, expected, "Expected {expected} turns in the log, got {actual}");
}

/// Assert the latest turn was spoken by `role` and reads `text`.
#[track_caller]
pub fn assert_last_turn(harness: &TestHarness, role: Role, text: &str) {
    let Some(turn) = harness.last_turn() else {
        panic!("Expected the log to have a turn");
    };
    assert_eq!(turn.role, role, "Expected last turn by {role:?}, got {:?}", turn.role);
    assert_eq!(turn.text, text);
}

/// Assert the board shows exactly these titles, newest first.
#[track_caller]
pub fn assert_clue_titles(harness: &TestHarness, expected: &[&str]) {
    let actual = harness.clue_titles();
    assert_eq!(actual, expected, "Unexpected board contents");
}

/// Assert no turn is in flight.
#[track_caller]
pub fn assert_idle(harness: &TestHarness) {
    assert!(
        !harness.investigation.is_busy(),
        "Expected idle, found {:?}",
        harness.investigation.phase()
    );
}
