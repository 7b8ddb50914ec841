//! Registry of session memory facades keyed by their settings.

use crate::entry_log::EntryLog;
use crate::error::{MemoryError, SummarizerError};
use crate::policy::CompactionPolicy;
use crate::session::{SessionLocks, SessionMemory};
use crate::summarizer::Summarizer;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Settings that distinguish one facade from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemorySettings {
    /// Compaction tunables.
    pub policy: CompactionPolicy,
    /// Summarizer model name.
    pub model: String,
}

/// Builds the summarizer for a given settings tuple.
pub type SummarizerFactory =
    Arc<dyn Fn(&MemorySettings) -> Result<Arc<dyn Summarizer>, SummarizerError> + Send + Sync>;

/// Owns one shared entry log and hands out a facade per settings tuple.
///
/// Created once at start-up; [`MemoryRegistry::close`] tears the log down.
pub struct MemoryRegistry {
    log: Arc<dyn EntryLog>,
    factory: SummarizerFactory,
    locks: Arc<SessionLocks>,
    managers: RwLock<HashMap<MemorySettings, Arc<SessionMemory>>>,
}

impl MemoryRegistry {
    pub fn new(log: Arc<dyn EntryLog>, factory: SummarizerFactory) -> Self {
        Self {
            log,
            factory,
            locks: Arc::default(),
            managers: RwLock::new(HashMap::new()),
        }
    }

    /// Facade for `settings`, built on first use.
    pub fn get(&self, settings: &MemorySettings) -> Result<Arc<SessionMemory>, MemoryError> {
        if let Some(manager) = self.managers.read().get(settings) {
            return Ok(manager.clone());
        }
        let mut managers = self.managers.write();
        if let Some(manager) = managers.get(settings) {
            return Ok(manager.clone());
        }
        debug!(
            "building session memory (model={}, characters_per_level={})",
            settings.model, settings.policy.characters_per_level
        );
        let manager = Arc::new(SessionMemory::with_locks(
            self.log.clone(),
            (self.factory)(settings)?,
            settings.policy.clone(),
            self.locks.clone(),
        ));
        managers.insert(settings.clone(), manager.clone());
        Ok(manager)
    }

    /// Number of facades built so far.
    pub fn len(&self) -> usize {
        self.managers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.read().is_empty()
    }

    /// Drop every facade and close the shared log.
    pub fn close(&self) -> Result<(), MemoryError> {
        let count = {
            let mut managers = self.managers.write();
            let count = managers.len();
            managers.clear();
            count
        };
        self.log.close()?;
        info!("memory registry closed (managers={count})");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryRegistry, MemorySettings, SummarizerFactory};
    use crate::entry_log::SqliteEntryLog;
    use crate::error::{MemoryError, StorageError, SummarizerError};
    use crate::policy::CompactionPolicy;
    use crate::summarizer::{Summarizer, Turn};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Constant;

    #[async_trait]
    impl Summarizer for Constant {
        async fn summarize(
            &self,
            _turns: &[Turn],
            _target_sentences: usize,
        ) -> Result<String, SummarizerError> {
            Ok("summary".to_string())
        }
    }

    fn registry(built: Arc<AtomicUsize>) -> MemoryRegistry {
        let log = Arc::new(SqliteEntryLog::open_in_memory().expect("log"));
        let factory: SummarizerFactory = Arc::new(
            move |settings: &MemorySettings| -> Result<Arc<dyn Summarizer>, SummarizerError> {
                if settings.model.is_empty() {
                    return Err(SummarizerError::Provider("no model".to_string()));
                }
                built.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Constant))
            },
        );
        MemoryRegistry::new(log, factory)
    }

    fn settings(characters_per_level: usize) -> MemorySettings {
        MemorySettings {
            policy: CompactionPolicy {
                characters_per_level,
                ..CompactionPolicy::default()
            },
            model: "test-model".to_string(),
        }
    }

    #[test]
    fn reuses_facade_for_equal_settings() {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = registry(built.clone());

        let first = registry.get(&settings(700)).expect("first");
        let again = registry.get(&settings(700)).expect("again");
        let other = registry.get(&settings(1000)).expect("other");

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(other.policy().characters_per_level, 1000);
    }

    #[tokio::test]
    async fn facades_share_one_log() {
        let registry = registry(Arc::new(AtomicUsize::new(0)));
        registry
            .get(&settings(700))
            .expect("manager")
            .append_raw("s", "Ana", "hello")
            .await
            .expect("append");
        let entries = registry
            .get(&settings(1000))
            .expect("manager")
            .entries("s")
            .expect("entries");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn close_tears_down_storage() {
        let registry = registry(Arc::new(AtomicUsize::new(0)));
        let manager = registry.get(&settings(700)).expect("manager");
        registry.close().expect("close");
        assert!(registry.is_empty());
        let err = manager.entries("s").unwrap_err();
        assert!(matches!(err, MemoryError::Storage(StorageError::Closed)));
    }

    #[test]
    fn factory_failures_are_not_cached() {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = registry(built.clone());
        let broken = MemorySettings {
            model: String::new(),
            ..settings(700)
        };

        let err = registry.get(&broken).err().expect("factory should fail");
        assert!(matches!(err, MemoryError::Summarization(_)));
        assert!(registry.is_empty());
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }
}
