//! Conversation log.
//!
//! The log is append-only during play: turns are never edited or reordered,
//! and chronological order is the only ordering. The oracle sees a bounded
//! window of it, derived on demand by [`ConversationLog::recent_window`].

use crate::id::TurnId;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message exchanged by the detective or the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub text: String,
    pub created_at: Timestamp,
}

impl Turn {
    /// A turn typed by the detective, stamped now.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// A turn spoken by the assistant, stamped now.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role,
            text: text.into(),
            created_at: now_millis(),
        }
    }
}

/// The role names the oracle expects in its history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleRole {
    User,
    Model,
}

impl OracleRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OracleRole::User => "user",
            OracleRole::Model => "model",
        }
    }
}

impl From<Role> for OracleRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => OracleRole::User,
            Role::Assistant => OracleRole::Model,
        }
    }
}

impl From<OracleRole> for Role {
    fn from(role: OracleRole) -> Self {
        match role {
            OracleRole::User => Role::User,
            OracleRole::Model => Role::Assistant,
        }
    }
}

/// A turn as presented to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: OracleRole,
    pub text: String,
}

/// Ordered record of every turn in the investigation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    /// An empty log. Sessions start from [`ConversationLog::seeded`] instead.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh log holding a single assistant turn with the opening narration.
    pub fn seeded(opening_narration: impl Into<String>) -> Self {
        let mut log = Self::new();
        log.append(Turn::assistant(opening_narration));
        log
    }

    /// Add a turn at the end.
    ///
    /// A timestamp earlier than the previous turn's (clock skew) is raised to
    /// match it, so timestamps never decrease along the log.
    pub fn append(&mut self, mut turn: Turn) {
        if let Some(last) = self.turns.last() {
            turn.created_at = turn.created_at.max(last.created_at);
        }
        self.turns.push(turn);
    }

    /// The last `n` turns (fewer if the log is shorter), oldest first, in the
    /// oracle's role names. Never mutates the log.
    pub fn recent_window(&self, n: usize) -> Vec<HistoryEntry> {
        let start = self.turns.len().saturating_sub(n);
        self.turns[start..]
            .iter()
            .map(|t| HistoryEntry {
                role: t.role.into(),
                text: t.text.clone(),
            })
            .collect()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Swap in a restored turn sequence wholesale.
    pub(crate) fn replace(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(texts: &[(Role, &str)]) -> ConversationLog {
        let mut log = ConversationLog::new();
        for (role, text) in texts {
            log.append(Turn::new(*role, *text));
        }
        log
    }

    #[test]
    fn test_seeded_log() {
        let log = ConversationLog::seeded("It was a dark and stormy night.");
        assert_eq!(log.len(), 1);
        assert_eq!(log.turns()[0].role, Role::Assistant);
        assert_eq!(log.turns()[0].text, "It was a dark and stormy night.");
    }

    #[test]
    fn test_append_preserves_order() {
        let log = log_with(&[
            (Role::Assistant, "intro"),
            (Role::User, "search the study"),
            (Role::Assistant, "you find ash"),
        ]);
        let texts: Vec<_> = log.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["intro", "search the study", "you find ash"]);
    }

    #[test]
    fn test_append_clamps_backwards_timestamps() {
        let mut log = ConversationLog::new();
        let mut first = Turn::user("first");
        first.created_at = 5_000;
        let mut second = Turn::assistant("second");
        second.created_at = 1_000;

        log.append(first);
        log.append(second);

        assert_eq!(log.turns()[1].created_at, 5_000);
    }

    #[test]
    fn test_recent_window_bounds() {
        let log = log_with(&[
            (Role::Assistant, "a"),
            (Role::User, "b"),
            (Role::Assistant, "c"),
        ]);

        assert_eq!(log.recent_window(2).len(), 2);
        assert_eq!(log.recent_window(10).len(), 3);
        assert!(log.recent_window(0).is_empty());
        assert!(ConversationLog::new().recent_window(6).is_empty());
    }

    #[test]
    fn test_recent_window_takes_newest_in_order() {
        let log = log_with(&[
            (Role::Assistant, "a"),
            (Role::User, "b"),
            (Role::Assistant, "c"),
            (Role::User, "d"),
        ]);

        let window = log.recent_window(3);
        let texts: Vec<_> = window.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c", "d"]);
        assert_eq!(window[0].role, OracleRole::User);
        assert_eq!(window[1].role, OracleRole::Model);
    }

    #[test]
    fn test_role_mapping_round_trips() {
        for role in [Role::User, Role::Assistant] {
            assert_eq!(Role::from(OracleRole::from(role)), role);
        }
        assert_eq!(OracleRole::from(Role::Assistant).as_str(), "model");
        assert_eq!(OracleRole::from(Role::User).as_str(), "user");
    }

    #[test]
    fn test_turn_wire_format() {
        let mut turn = Turn::user("Who found the body?");
        turn.created_at = 1_700_000_000_000;
        let json = serde_json::to_value(&turn).unwrap();

        assert_eq!(json["role"], "user");
        assert_eq!(json["text"], "Who found the body?");
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
        assert!(json["id"].is_string());
    }
}
