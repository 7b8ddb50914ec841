//! Configuration schema for chronicle.

use chronicle_memory::{CompactionPolicy, MemorySettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root config for the memory store and its summarizer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ChronicleConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

impl ChronicleConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ChronicleConfigBuilder {
        ChronicleConfigBuilder::new()
    }

    /// Registry key for the memory facade described by this config.
    pub fn memory_settings(&self) -> MemorySettings {
        MemorySettings {
            policy: self.memory.policy(),
            model: self.summarizer.model.clone(),
        }
    }
}

/// Builder for assembling a `ChronicleConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ChronicleConfigBuilder {
    config: ChronicleConfig,
}

impl ChronicleConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: ChronicleConfig::default(),
        }
    }

    /// Replace the memory configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the summarizer configuration.
    pub fn summarizer(mut self, summarizer: SummarizerConfig) -> Self {
        self.config.summarizer = summarizer;
        self
    }

    /// Point the entry log at a different database file.
    pub fn memory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.memory.path = path.into();
        self
    }

    pub fn build(self) -> ChronicleConfig {
        self.config
    }
}

/// Storage location and compaction tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// SQLite database file; `:memory:` keeps everything in process.
    #[serde(default = "default_memory_path")]
    pub path: PathBuf,
    #[serde(default = "default_characters_per_level")]
    pub characters_per_level: usize,
    #[serde(default = "default_sentences_per_summary")]
    pub sentences_per_summary: usize,
    #[serde(default = "default_min_run_length")]
    pub min_run_length: usize,
    #[serde(default = "default_trigger_ratio")]
    pub trigger_ratio: f64,
    /// Crop budget for sessions that do not use memory.
    #[serde(default = "default_fallback_characters")]
    pub fallback_characters: usize,
}

impl MemoryConfig {
    /// Compaction policy built from these settings.
    pub fn policy(&self) -> CompactionPolicy {
        CompactionPolicy {
            characters_per_level: self.characters_per_level,
            sentences_per_summary: self.sentences_per_summary,
            min_run_length: self.min_run_length,
            trigger_ratio: self.trigger_ratio,
        }
    }

    /// Whether the entry log lives only in memory.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
            characters_per_level: default_characters_per_level(),
            sentences_per_summary: default_sentences_per_summary(),
            min_run_length: default_min_run_length(),
            trigger_ratio: default_trigger_ratio(),
            fallback_characters: default_fallback_characters(),
        }
    }
}

/// Path value selecting an in-memory entry log.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Default SQLite database path.
fn default_memory_path() -> PathBuf {
    PathBuf::from("cache/memory.db")
}

/// Default size of one memory level.
fn default_characters_per_level() -> usize {
    1000
}

/// Default sentence count per summary.
fn default_sentences_per_summary() -> usize {
    3
}

/// Default minimum run length eligible for compaction.
fn default_min_run_length() -> usize {
    3
}

/// Default overshoot ratio before compaction fires.
fn default_trigger_ratio() -> f64 {
    1.5
}

/// Default crop budget when memory is disabled.
fn default_fallback_characters() -> usize {
    3000
}

/// Chat-completions endpoint used to write summaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummarizerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama3-70b-8192".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    200
}

fn default_timeout_secs() -> u64 {
    60
}
