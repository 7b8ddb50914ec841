//! Memory entry model used by the entry log.

use serde::{Deserialize, Serialize};

/// Identifier assigned by the entry log on insert.
pub type EntryId = i64;

/// Author recorded on synthesized summary entries.
pub const MEMORY_AUTHOR: &str = "memory";

/// Persisted memory entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryEntry {
    /// Log-assigned identifier.
    pub id: EntryId,
    /// Session the entry belongs to.
    pub session_id: String,
    /// Display name of the speaker, or [`MEMORY_AUTHOR`] for summaries.
    pub author: String,
    /// Milliseconds since the epoch.
    pub timestamp_ms: i64,
    /// Verbatim turn or summary text.
    pub content: String,
    /// Compaction generation; 0 for raw turns.
    pub level: u32,
}

impl MemoryEntry {
    /// Content length in characters.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// True when the entry was produced by compaction.
    pub fn is_synthesized(&self) -> bool {
        self.level > 0
    }

    /// Render the entry as a transcript line.
    pub fn line(&self) -> String {
        format!("{}: {}", self.author, self.content)
    }
}

/// Entry that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEntry {
    pub session_id: String,
    pub author: String,
    pub timestamp_ms: i64,
    pub content: String,
    pub level: u32,
}

impl NewEntry {
    /// Build a level 0 entry for an ingested turn.
    pub fn raw(
        session_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            author: author.into(),
            timestamp_ms,
            content: content.into(),
            level: 0,
        }
    }

    /// Attach the identifier the log assigned.
    pub fn persisted(self, id: EntryId) -> MemoryEntry {
        MemoryEntry {
            id,
            session_id: self.session_id,
            author: self.author,
            timestamp_ms: self.timestamp_ms,
            content: self.content,
            level: self.level,
        }
    }
}

/// Render entries as `author: content` lines in the given order.
pub fn render_entries(entries: &[MemoryEntry]) -> String {
    entries
        .iter()
        .map(MemoryEntry::line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn char_len_counts_characters_not_bytes() {
        let entry = NewEntry::raw("s", "Ana", "héllo", 1).persisted(1);
        assert_eq!(entry.char_len(), 5);
        assert!(!entry.is_synthesized());
    }

    #[test]
    fn render_joins_lines() {
        let entries = vec![
            NewEntry::raw("s", "Ana", "hi", 1).persisted(1),
            NewEntry::raw("s", "You", "hello", 2).persisted(2),
        ];
        assert_eq!(render_entries(&entries), "Ana: hi\nYou: hello");
        assert_eq!(render_entries(&[]), "");
    }
}
