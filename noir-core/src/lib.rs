//! Session engine for an AI-narrated detective investigation.
//!
//! This crate provides:
//! - The conversation log and the case board of clues
//! - The turn cycle that consults the narrator and materializes clues
//! - Save slots for the whole session
//! - Gemini-backed narrator and evidence photographer
//!
//! # Quick Start
//!
//! ```ignore
//! use noir_core::{Investigation, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let investigation = Investigation::with_gemini(SessionConfig::from_env()?);
//!
//!     let outcome = investigation.send("Search the study").await;
//!     if let Some(reply) = outcome.reply() {
//!         println!("{}", reply.text);
//!     }
//!
//!     investigation.save(1).await?;
//!     Ok(())
//! }
//! ```

pub mod case;
pub mod clues;
pub mod id;
pub mod log;
pub mod oracle;
pub mod orchestrator;
pub mod persist;
pub mod session;
mod state;
pub mod testing;

// Primary public API
pub use case::CaseContext;
pub use clues::{Clue, ClueKind, ClueStore};
pub use id::{ClueId, TurnId};
pub use log::{ConversationLog, HistoryEntry, OracleRole, Role, Turn};
pub use oracle::{
    ClueDescriptor, GeminiOracle, GeminiSynthesizer, NoSynthesizer, Oracle, OracleConfig,
    OracleError, OracleReply, OracleRequest, SynthesisError, Synthesizer,
};
pub use orchestrator::{Rejection, TurnConfig, TurnOrchestrator, TurnOutcome};
pub use persist::{
    FileSlotStore, LoadOutcome, MemorySlotStore, PersistError, SaveReceipt, SessionSnapshot,
    SlotStore, SlotSummary, StoreError,
};
pub use session::{Investigation, SessionConfig, SessionError};
pub use state::Phase;
pub use testing::{ScriptedOracle, ScriptedSynthesizer, TestHarness};
