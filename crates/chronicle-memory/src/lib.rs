//! Per-session conversation memory for chronicle.
//!
//! Each session owns an append-only log of entries. Raw turns enter at level
//! 0; once a run of entries grows past the configured budget its oldest
//! prefix is summarized into a single entry one level higher. The facade in
//! [`session`] ties reconciliation, storage and compaction together.

pub mod compactor;
pub mod conversation;
pub mod entry_log;
pub mod error;
pub mod model;
pub mod policy;
pub mod reconcile;
pub mod registry;
pub mod runs;
pub mod session;
pub mod summarizer;

/// Compaction pass results.
pub use compactor::{CompactionPass, Compactor};
/// Conversation input types and preparation helpers.
pub use conversation::{
    ConversationMessage, Role, clean_conversation, crop_conversation, render_messages,
    session_key, validate_conversation,
};
/// Entry log abstraction and the SQLite implementation.
pub use entry_log::{EntryLog, SqliteEntryLog};
/// Memory error types.
pub use error::{MemoryError, StorageError, SummarizerError};
/// Stored entry model.
pub use model::{EntryId, MEMORY_AUTHOR, MemoryEntry, NewEntry, render_entries};
/// Compaction tunables.
pub use policy::CompactionPolicy;
/// Replay reconciliation.
pub use reconcile::unseen_suffix;
/// Registry of facades keyed by settings.
pub use registry::{MemoryRegistry, MemorySettings, SummarizerFactory};
/// Run detection.
pub use runs::partition_runs;
/// Session memory facade.
pub use session::SessionMemory;
/// Summarizer collaborator interface.
pub use summarizer::{Summarizer, Turn};
