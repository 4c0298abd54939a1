//! Clues and the case board that collects them.

use crate::id::ClueId;
use crate::log::{now_millis, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What a clue carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClueKind {
    /// Inline text: a letter, a statement, a note.
    Text,
    /// A photograph of physical evidence.
    Image,
    /// A floor plan or street map.
    Map,
}

impl ClueKind {
    /// Image and map clues carry an image reference instead of text.
    pub fn is_visual(&self) -> bool {
        matches!(self, ClueKind::Image | ClueKind::Map)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClueKind::Text => "text",
            ClueKind::Image => "image",
            ClueKind::Map => "map",
        }
    }
}

/// A discovered piece of evidence. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clue {
    pub id: ClueId,
    pub title: String,
    pub description: String,
    pub kind: ClueKind,
    /// Inline text for text clues; an image reference (data URI or URL) otherwise.
    pub content: String,
    pub created_at: Timestamp,
}

impl Clue {
    /// Create a clue with a fresh id, stamped now.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        kind: ClueKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: ClueId::new(),
            title: title.into(),
            description: description.into(),
            kind,
            content: content.into(),
            created_at: now_millis(),
        }
    }

    pub fn is_visual(&self) -> bool {
        self.kind.is_visual()
    }
}

/// The case board: every clue found so far, newest first.
///
/// There is no removal or update. Clues only disappear when a saved session
/// is loaded over the current one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClueStore {
    clues: VecDeque<Clue>,
}

impl ClueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a clue to the front of the board. Duplicate titles are kept.
    pub fn insert(&mut self, clue: Clue) {
        self.clues.push_front(clue);
    }

    /// All clues, newest first.
    pub fn all(&self) -> impl Iterator<Item = &Clue> {
        self.clues.iter()
    }

    /// Copy of the board, newest first.
    pub fn to_vec(&self) -> Vec<Clue> {
        self.clues.iter().cloned().collect()
    }

    /// Look up a clue by position on the board (0 is newest).
    pub fn get(&self, index: usize) -> Option<&Clue> {
        self.clues.get(index)
    }

    pub fn len(&self) -> usize {
        self.clues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clues.is_empty()
    }

    /// Swap in a restored board wholesale, keeping its order.
    pub(crate) fn replace(&mut self, clues: Vec<Clue>) {
        self.clues = clues.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_newest_first() {
        let mut store = ClueStore::new();
        store.insert(Clue::new(
            "Torn letter",
            "Found in the grate",
            ClueKind::Text,
            "...meet me at",
        ));
        store.insert(Clue::new(
            "Study plan",
            "Layout of the study",
            ClueKind::Map,
            "https://example.com/plan.png",
        ));

        let titles: Vec<_> = store.all().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Study plan", "Torn letter"]);
        assert_eq!(store.get(0).unwrap().title, "Study plan");
    }

    #[test]
    fn test_duplicate_titles_are_kept() {
        let mut store = ClueStore::new();
        store.insert(Clue::new("Brandy glass", "Untouched", ClueKind::Text, ""));
        store.insert(Clue::new("Brandy glass", "Untouched", ClueKind::Text, ""));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_replace_keeps_given_order() {
        let mut store = ClueStore::new();
        store.insert(Clue::new("Old", "", ClueKind::Text, ""));

        let restored = vec![
            Clue::new("Newest", "", ClueKind::Text, ""),
            Clue::new("Oldest", "", ClueKind::Image, "data:image/png;base64,AA=="),
        ];
        store.replace(restored.clone());

        assert_eq!(store.to_vec(), restored);
    }

    #[test]
    fn test_kind_is_visual() {
        assert!(!ClueKind::Text.is_visual());
        assert!(ClueKind::Image.is_visual());
        assert!(ClueKind::Map.is_visual());
    }

    #[test]
    fn test_clue_wire_format() {
        let clue = Clue::new(
            "Ledger",
            "Accounts for March",
            ClueKind::Image,
            "data:image/png;base64,AA==",
        );
        let json = serde_json::to_value(&clue).unwrap();

        assert_eq!(json["kind"], "image");
        assert_eq!(json["content"], "data:image/png;base64,AA==");
        assert!(json["createdAt"].is_i64());

        let back: Clue = serde_json::from_value(json).unwrap();
        assert_eq!(back, clue);
    }
}
