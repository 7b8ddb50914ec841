//! Durable, ordered storage of memory entries.

use crate::error::StorageError;
use crate::model::{EntryId, MemoryEntry, NewEntry};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, Row, params};
use std::path::Path;

/// Ordered log of memory entries partitioned by session.
///
/// Entries are immutable once stored; compaction replaces them through
/// [`EntryLog::swap`], which must apply its delete and insert atomically.
pub trait EntryLog: Send + Sync {
    /// Insert an entry and return its identifier.
    fn append(&self, entry: NewEntry) -> Result<EntryId, StorageError>;

    /// Insert several entries, returning them with identifiers attached.
    fn append_all(&self, entries: Vec<NewEntry>) -> Result<Vec<MemoryEntry>, StorageError> {
        let mut stored = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = self.append(entry.clone())?;
            stored.push(entry.persisted(id));
        }
        Ok(stored)
    }

    /// Entries of a session sorted by `(timestamp, id)`. Unknown sessions yield nothing.
    fn fetch_ordered(&self, session_id: &str) -> Result<Vec<MemoryEntry>, StorageError>;

    /// Delete entries by id, returning how many were removed.
    fn delete(&self, ids: &[EntryId]) -> Result<usize, StorageError>;

    /// Delete `removed` and insert `replacement` as one transaction.
    ///
    /// Fails with [`StorageError::Conflict`] and changes nothing when any of the
    /// removed ids is missing from `replacement`'s session.
    fn swap(&self, removed: &[EntryId], replacement: NewEntry)
    -> Result<MemoryEntry, StorageError>;

    /// Delete every entry of one session.
    fn delete_session(&self, session_id: &str) -> Result<usize, StorageError>;

    /// Delete every entry of every session.
    fn delete_all(&self) -> Result<usize, StorageError>;

    /// Release the underlying storage. Later calls fail with [`StorageError::Closed`].
    fn close(&self) -> Result<(), StorageError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memory (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    author TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    content TEXT NOT NULL,
    level INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_memory_session ON memory(session_id, timestamp_ms);
";

const INSERT_ENTRY: &str = "INSERT INTO memory (session_id, author, timestamp_ms, content, level)
     VALUES (?1, ?2, ?3, ?4, ?5)";

/// SQLite-backed entry log.
///
/// One connection guarded by a mutex; every operation is short, so callers on
/// different sessions only contend for the duration of a single statement.
pub struct SqliteEntryLog {
    conn: Mutex<Option<Connection>>,
}

impl SqliteEntryLog {
    /// Open (or create) a database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        info!("opened sqlite entry log (path={})", path.display());
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        debug!("opened in-memory sqlite entry log");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StorageError::Closed)?;
        f(conn)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryEntry> {
    Ok(MemoryEntry {
        id: row.get(0)?,
        session_id: row.get(1)?,
        author: row.get(2)?,
        timestamp_ms: row.get(3)?,
        content: row.get(4)?,
        level: row.get(5)?,
    })
}

fn insert_entry(conn: &Connection, entry: &NewEntry) -> rusqlite::Result<EntryId> {
    conn.execute(
        INSERT_ENTRY,
        params![
            entry.session_id,
            entry.author,
            entry.timestamp_ms,
            entry.content,
            entry.level
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl EntryLog for SqliteEntryLog {
    fn append(&self, entry: NewEntry) -> Result<EntryId, StorageError> {
        self.with_conn(|conn| {
            let id = insert_entry(conn, &entry)?;
            debug!(
                "appended memory entry (session_id={}, id={}, level={}, content_len={})",
                entry.session_id,
                id,
                entry.level,
                entry.content.len()
            );
            Ok(id)
        })
    }

    fn append_all(&self, entries: Vec<NewEntry>) -> Result<Vec<MemoryEntry>, StorageError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut stored = Vec::with_capacity(entries.len());
            for entry in entries {
                let id = insert_entry(&tx, &entry)?;
                stored.push(entry.persisted(id));
            }
            tx.commit()?;
            debug!("appended memory entries (count={})", stored.len());
            Ok(stored)
        })
    }

    fn fetch_ordered(&self, session_id: &str) -> Result<Vec<MemoryEntry>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, session_id, author, timestamp_ms, content, level
                 FROM memory
                 WHERE session_id = ?1
                 ORDER BY timestamp_ms, id",
            )?;
            let entries = stmt
                .query_map(params![session_id], entry_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    fn delete(&self, ids: &[EntryId]) -> Result<usize, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut deleted = 0;
            {
                let mut stmt = tx.prepare_cached("DELETE FROM memory WHERE id = ?1")?;
                for id in ids {
                    deleted += stmt.execute(params![id])?;
                }
            }
            tx.commit()?;
            Ok(deleted)
        })
    }

    fn swap(
        &self,
        removed: &[EntryId],
        replacement: NewEntry,
    ) -> Result<MemoryEntry, StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut deleted = 0;
            {
                let mut stmt =
                    tx.prepare_cached("DELETE FROM memory WHERE id = ?1 AND session_id = ?2")?;
                for id in removed {
                    deleted += stmt.execute(params![id, replacement.session_id])?;
                }
            }
            if deleted != removed.len() {
                // Dropping the transaction rolls the deletes back.
                return Err(StorageError::Conflict(format!(
                    "expected to replace {} entries in session {}, found {}",
                    removed.len(),
                    replacement.session_id,
                    deleted
                )));
            }
            let id = insert_entry(&tx, &replacement)?;
            tx.commit()?;
            Ok(replacement.persisted(id))
        })
    }

    fn delete_session(&self, session_id: &str) -> Result<usize, StorageError> {
        self.with_conn(|conn| {
            let deleted =
                conn.execute("DELETE FROM memory WHERE session_id = ?1", params![session_id])?;
            info!("pruned session memory (session_id={session_id}, deleted={deleted})");
            Ok(deleted)
        })
    }

    fn delete_all(&self) -> Result<usize, StorageError> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM memory", [])?;
            info!("pruned all memory (deleted={deleted})");
            Ok(deleted)
        })
    }

    fn close(&self) -> Result<(), StorageError> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, err)| StorageError::Sqlite(err))?;
        info!("closed sqlite entry log");
        Ok(())
    }
}
