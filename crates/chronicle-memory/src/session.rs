//! Session memory facade: reconcile, append, compact, render.

use crate::compactor::{CompactionPass, Compactor};
use crate::conversation::{ConversationMessage, validate_conversation};
use crate::entry_log::EntryLog;
use crate::error::MemoryError;
use crate::model::{MemoryEntry, NewEntry, render_entries};
use crate::policy::CompactionPolicy;
use crate::reconcile::unseen_suffix;
use crate::summarizer::Summarizer;
use chrono::Utc;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Per-session async locks; calls for different sessions never contend.
#[derive(Default)]
pub(crate) struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    /// Wait for exclusive access to a session.
    pub(crate) async fn acquire(&self, session_id: &str) -> SessionGuard<'_> {
        let lock = self
            .locks
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        SessionGuard {
            locks: self,
            session_id: session_id.to_string(),
            guard: Some(guard),
        }
    }
}

/// Held while a session's log is being read and rewritten.
pub(crate) struct SessionGuard<'a> {
    locks: &'a SessionLocks,
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.locks.lock();
        // Only the map references the lock once nobody holds or awaits it.
        if let Some(lock) = locks.get(&self.session_id)
            && Arc::strong_count(lock) == 1
        {
            locks.remove(&self.session_id);
        }
    }
}

/// Compacting memory for chat sessions.
///
/// One instance serves every session stored in its log. Calls for the same
/// session are serialized from fetch to compaction commit.
pub struct SessionMemory {
    log: Arc<dyn EntryLog>,
    summarizer: Arc<dyn Summarizer>,
    policy: CompactionPolicy,
    locks: Arc<SessionLocks>,
}

impl SessionMemory {
    /// Create a facade over a log and summarizer.
    pub fn new(
        log: Arc<dyn EntryLog>,
        summarizer: Arc<dyn Summarizer>,
        policy: CompactionPolicy,
    ) -> Self {
        Self::with_locks(log, summarizer, policy, Arc::default())
    }

    /// Create a facade that shares session locks with other facades on the same log.
    pub(crate) fn with_locks(
        log: Arc<dyn EntryLog>,
        summarizer: Arc<dyn Summarizer>,
        policy: CompactionPolicy,
        locks: Arc<SessionLocks>,
    ) -> Self {
        Self {
            log,
            summarizer,
            policy,
            locks,
        }
    }

    /// Active compaction policy.
    pub fn policy(&self) -> &CompactionPolicy {
        &self.policy
    }

    /// Store the unseen tail of `conversation` and return the compacted transcript.
    ///
    /// Input is validated before anything is written. Summarizer failures do
    /// not fail the call; the affected runs stay verbatim and are retried on
    /// the next call.
    pub async fn process(
        &self,
        session_id: &str,
        conversation: &[ConversationMessage],
    ) -> Result<String, MemoryError> {
        validate_conversation(conversation)?;
        let _guard = self.locks.acquire(session_id).await;

        let stored = self.log.fetch_ordered(session_id)?;
        let unseen = unseen_suffix(conversation, &stored);
        debug!(
            "reconciled conversation (session_id={}, supplied={}, new={})",
            session_id,
            conversation.len(),
            unseen.len()
        );

        let entries = if unseen.is_empty() {
            stored
        } else {
            let start = next_timestamp(&stored);
            let new_entries = unseen
                .iter()
                .zip(start..)
                .map(|(message, timestamp_ms)| {
                    NewEntry::raw(
                        session_id,
                        message.author().unwrap_or_default(),
                        message.content.clone(),
                        timestamp_ms,
                    )
                })
                .collect();
            self.log.append_all(new_entries)?;
            self.log.fetch_ordered(session_id)?
        };

        let pass = self.compactor().compact_entries(entries).await?;
        Ok(render_entries(&pass.entries))
    }

    /// Append a single level 0 entry stamped with the current time.
    pub async fn append_raw(
        &self,
        session_id: &str,
        author: &str,
        content: &str,
    ) -> Result<MemoryEntry, MemoryError> {
        if author.trim().is_empty() {
            return Err(MemoryError::InvalidInput(
                "entries must have an author".to_string(),
            ));
        }
        let _guard = self.locks.acquire(session_id).await;
        let stored = self.log.fetch_ordered(session_id)?;
        let entry = NewEntry::raw(session_id, author, content, next_timestamp(&stored));
        let id = self.log.append(entry.clone())?;
        Ok(entry.persisted(id))
    }

    /// Run one compaction pass over a session without appending anything.
    pub async fn compact(&self, session_id: &str) -> Result<CompactionPass, MemoryError> {
        let _guard = self.locks.acquire(session_id).await;
        let entries = self.log.fetch_ordered(session_id)?;
        self.compactor().compact_entries(entries).await
    }

    /// Stored entries of a session in `(timestamp, id)` order.
    pub fn entries(&self, session_id: &str) -> Result<Vec<MemoryEntry>, MemoryError> {
        Ok(self.log.fetch_ordered(session_id)?)
    }

    /// Wipe one session, or every session when `session_id` is `None`.
    pub async fn prune(&self, session_id: Option<&str>) -> Result<usize, MemoryError> {
        let deleted = match session_id {
            Some(session_id) => {
                let _guard = self.locks.acquire(session_id).await;
                self.log.delete_session(session_id)?
            }
            None => self.log.delete_all()?,
        };
        info!(
            "memory pruned (session_id={}, deleted={deleted})",
            session_id.unwrap_or("*")
        );
        Ok(deleted)
    }

    /// Release the underlying storage.
    pub fn close(&self) -> Result<(), MemoryError> {
        Ok(self.log.close()?)
    }

    fn compactor(&self) -> Compactor<'_> {
        Compactor::new(
            self.log.as_ref(),
            self.summarizer.as_ref(),
            &self.policy,
        )
    }
}

/// Current time, pushed past every stored timestamp of the session.
///
/// Raw turns get strictly increasing timestamps, so a summary that inherits
/// the timestamp of a replaced turn sorts ahead of the turns it kept.
fn next_timestamp(stored: &[MemoryEntry]) -> i64 {
    let now = Utc::now().timestamp_millis();
    stored
        .iter()
        .map(|entry| entry.timestamp_ms + 1)
        .max()
        .map_or(now, |after_last| after_last.max(now))
}

#[cfg(test)]
mod tests {
    use super::{SessionLocks, next_timestamp};
    use crate::model::NewEntry;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn next_timestamp_moves_past_stored_entries() {
        let future = chrono::Utc::now().timestamp_millis() + 60_000;
        let stored = vec![NewEntry::raw("s", "Ana", "a", future).persisted(1)];
        assert_eq!(next_timestamp(&stored), future + 1);
        assert!(next_timestamp(&[]) > 0);
    }

    #[tokio::test]
    async fn released_locks_are_forgotten() {
        let locks = SessionLocks::default();
        {
            let _guard = locks.acquire("s").await;
            assert_eq!(locks.locks.lock().len(), 1);
        }
        assert!(locks.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn same_session_waits_for_holder() {
        let locks = Arc::new(SessionLocks::default());
        let guard = locks.acquire("s").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("s").await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        let _other = locks.acquire("t").await;
        drop(guard);
        waiter.await.expect("waiter");
    }
}
