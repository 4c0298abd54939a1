//! Save slots.
//!
//! A save is a [`SessionSnapshot`] serialized to JSON under a slot-scoped key
//! in a [`SlotStore`]. Writing a slot always overwrites it; loading replaces
//! the log and the board wholesale. The case context is not saved; it comes
//! from configuration.

use crate::clues::Clue;
use crate::log::{now_millis, Timestamp, Turn};
use crate::state::{lock, SharedState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// Failures of the underlying key-value storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {limit} allowed")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors from save and load.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Case file storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Case file damaged, cannot be read")]
    Corrupted { slot: u32, reason: String },

    #[error("Case file could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Prefix of every slot key.
pub const SLOT_KEY_PREFIX: &str = "detective_save_slot_";

/// Number of characters of the latest turn kept as a preview.
pub const PREVIEW_CHARS: usize = 30;

/// Preview used when the log is empty at save time.
pub const EMPTY_PREVIEW: &str = "New investigation opened";

/// The storage key for a slot.
pub fn slot_key(slot: u32) -> String {
    format!("{SLOT_KEY_PREFIX}{slot}")
}

/// Durable string storage addressed by key.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Read a value. A key that was never written is `Ok(None)`.
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing whatever was there.
    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Fails when the save path exists but is not a directory.
    async fn check_dir(&self) -> Result<(), StoreError> {
        match fs::metadata(&self.dir).await {
            Ok(meta) if !meta.is_dir() => Err(StoreError::Unavailable(format!(
                "{} is not a directory",
                self.dir.display()
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SlotStore for FileSlotStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_dir().await?;
        match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_dir().await?;
        fs::create_dir_all(&self.dir).await?;

        // Write beside the target then rename over it, so readers never see half a file.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Slots held in memory, with an optional cap on the size of a single value.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes larger than `bytes`.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Put a raw value under a key, bypassing the quota.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    /// Raw value under a key.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get_raw(key))
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(limit) = self.quota {
            if value.len() > limit {
                return Err(StoreError::QuotaExceeded {
                    needed: value.len(),
                    limit,
                });
            }
        }
        self.insert_raw(key, value);
        Ok(())
    }
}

/// Everything a save slot holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub turns: Vec<Turn>,
    /// Newest first, as on the board.
    pub clues: Vec<Clue>,
    pub timestamp: Timestamp,
    pub case_id: String,
    pub preview: String,
}

impl SessionSnapshot {
    /// Snapshot the given turns and clues, stamped now.
    pub fn capture(turns: Vec<Turn>, clues: Vec<Clue>, case_id: impl Into<String>) -> Self {
        let preview = preview_of(turns.last());
        Self {
            turns,
            clues,
            timestamp: now_millis(),
            case_id: case_id.into(),
            preview,
        }
    }

    pub fn summary(&self, slot: u32) -> SlotSummary {
        SlotSummary {
            slot,
            timestamp: self.timestamp,
            case_id: self.case_id.clone(),
            preview: self.preview.clone(),
            turn_count: self.turns.len(),
            clue_count: self.clues.len(),
        }
    }
}

/// The first few characters of a turn, for slot listings.
fn preview_of(turn: Option<&Turn>) -> String {
    match turn {
        Some(turn) => turn.text.chars().take(PREVIEW_CHARS).collect(),
        None => EMPTY_PREVIEW.to_string(),
    }
}

/// What a save or load picker shows for an occupied slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSummary {
    pub slot: u32,
    pub timestamp: Timestamp,
    pub case_id: String,
    pub preview: String,
    pub turn_count: usize,
    pub clue_count: usize,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub slot: u32,
    pub summary: SlotSummary,
}

impl SaveReceipt {
    /// Status line for the detective.
    pub fn message(&self) -> String {
        format!("Case file stored in cabinet #{}", self.slot)
    }
}

/// Result of a load that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The slot's contents replaced the session.
    Restored(SlotSummary),
    /// Nothing was saved in the slot; the session is unchanged.
    Empty,
}

impl LoadOutcome {
    /// Status line for the detective, if there is anything to say.
    pub fn message(&self) -> Option<String> {
        match self {
            LoadOutcome::Restored(summary) => {
                Some(format!("Case file #{} retrieved", summary.slot))
            }
            LoadOutcome::Empty => None,
        }
    }
}

/// Saves the session into slots and restores it from them.
pub struct PersistenceManager {
    state: SharedState,
    store: std::sync::Arc<dyn SlotStore>,
    case_id: String,
}

impl PersistenceManager {
    pub(crate) fn new(
        state: SharedState,
        store: std::sync::Arc<dyn SlotStore>,
        case_id: impl Into<String>,
    ) -> Self {
        Self {
            state,
            store,
            case_id: case_id.into(),
        }
    }

    /// Write the current log and board to `slot`, replacing what was there.
    pub async fn save(&self, slot: u32) -> Result<SaveReceipt, PersistError> {
        let snapshot = {
            let state = lock(&self.state);
            SessionSnapshot::capture(
                state.log.turns().to_vec(),
                state.clues.to_vec(),
                self.case_id.clone(),
            )
        };

        let json = serde_json::to_string(&snapshot)?;
        if let Err(e) = self.store.write(&slot_key(slot), &json).await {
            warn!(slot, error = %e, "save failed");
            return Err(e.into());
        }

        info!(
            slot,
            turns = snapshot.turns.len(),
            clues = snapshot.clues.len(),
            "session saved"
        );
        Ok(SaveReceipt {
            slot,
            summary: snapshot.summary(slot),
        })
    }

    /// Replace the log and board with the contents of `slot`.
    ///
    /// An empty slot leaves the session alone. A damaged slot is an error and
    /// also leaves the session alone.
    pub async fn load(&self, slot: u32) -> Result<LoadOutcome, PersistError> {
        let Some(snapshot) = self.read_snapshot(slot).await? else {
            info!(slot, "load from empty slot ignored");
            return Ok(LoadOutcome::Empty);
        };

        let summary = snapshot.summary(slot);
        {
            let mut state = lock(&self.state);
            state.log.replace(snapshot.turns);
            state.clues.replace(snapshot.clues);
        }

        info!(slot, turns = summary.turn_count, clues = summary.clue_count, "session restored");
        Ok(LoadOutcome::Restored(summary))
    }

    /// Describe what `slot` holds without touching the session.
    pub async fn peek(&self, slot: u32) -> Result<Option<SlotSummary>, PersistError> {
        Ok(self
            .read_snapshot(slot)
            .await?
            .map(|snapshot| snapshot.summary(slot)))
    }

    /// Summaries of the given slots, in order. Damaged slots are skipped.
    pub async fn list(
        &self,
        slots: impl IntoIterator<Item = u32>,
    ) -> Result<Vec<SlotSummary>, PersistError> {
        let mut summaries = Vec::new();
        for slot in slots {
            match self.peek(slot).await {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(PersistError::Corrupted { slot, reason }) => {
                    warn!(slot, %reason, "skipping damaged slot");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summaries)
    }

    async fn read_snapshot(&self, slot: u32) -> Result<Option<SessionSnapshot>, PersistError> {
        let Some(raw) = self.store.read(&slot_key(slot)).await? else {
            return Ok(None);
        };

        serde_json::from_str(&raw).map(Some).map_err(|e| {
            warn!(slot, error = %e, "slot content is damaged");
            PersistError::Corrupted {
                slot,
                reason: e.to_string(),
            }
        })
    }
}
