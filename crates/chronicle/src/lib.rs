//! Public surface for chronicle.
//!
//! This crate re-exports the memory core, the config schema and the
//! chat-completions summarizer, and wires them together from a loaded config.

/// Re-export for convenience.
pub use chronicle_config as config;
/// Re-export for convenience.
pub use chronicle_memory as memory;
/// Re-export for convenience.
pub use chronicle_summarizer as summarizer;

use chronicle_config::{ChronicleConfig, MemoryConfig, SummarizerConfig};
use chronicle_memory::{
    MemoryRegistry, MemorySettings, SqliteEntryLog, StorageError, Summarizer, SummarizerError,
    SummarizerFactory,
};
use chronicle_summarizer::ChatCompletionSummarizer;
use log::info;
use std::sync::Arc;

/// Initialize logging through env_logger; `RUST_LOG` controls the filter.
///
/// Safe to call more than once. Binaries call this first thing in `main`.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}

/// Open the entry log configured under `memory.path`.
pub fn open_entry_log(config: &MemoryConfig) -> Result<Arc<SqliteEntryLog>, StorageError> {
    let log = if config.is_in_memory() {
        SqliteEntryLog::open_in_memory()?
    } else {
        SqliteEntryLog::open(&config.path)?
    };
    Ok(Arc::new(log))
}

/// Factory building one chat-completions summarizer per requested model.
pub fn summarizer_factory(config: SummarizerConfig) -> SummarizerFactory {
    Arc::new(
        move |settings: &MemorySettings| -> Result<Arc<dyn Summarizer>, SummarizerError> {
            let config = SummarizerConfig {
                model: settings.model.clone(),
                ..config.clone()
            };
            Ok(Arc::new(ChatCompletionSummarizer::from_config(&config)?))
        },
    )
}

/// Registry over the configured entry log and summarizer endpoint.
pub fn open_registry(config: &ChronicleConfig) -> Result<MemoryRegistry, StorageError> {
    let log = open_entry_log(&config.memory)?;
    info!(
        "memory store ready (path={}, model={})",
        config.memory.path.display(),
        config.summarizer.model
    );
    Ok(MemoryRegistry::new(
        log,
        summarizer_factory(config.summarizer.clone()),
    ))
}
