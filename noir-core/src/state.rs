//! Mutable session state shared by the turn cycle and save/load.

use crate::clues::ClueStore;
use crate::log::ConversationLog;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where the turn cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Ready for the next submission.
    #[default]
    Idle,
    /// Waiting on the oracle.
    AwaitingReply,
    /// Turning proposed clues into board entries.
    MaterializingClues,
}

impl Phase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }
}

/// Everything a turn cycle or a load may touch.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub log: ConversationLog,
    pub clues: ClueStore,
    pub phase: Phase,
    /// What the detective has typed but not yet sent.
    pub draft: String,
}

impl SessionState {
    pub fn new(log: ConversationLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }
}

pub(crate) type SharedState = Arc<Mutex<SessionState>>;

/// Lock the state. Guards are never held across an await, and every write
/// leaves the state consistent, so a poisoned lock is still usable.
pub(crate) fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
