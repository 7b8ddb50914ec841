//! Summarizer collaborator used by compaction.

use crate::error::SummarizerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One speaker turn handed to the summarizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub author: String,
    pub content: String,
}

impl Turn {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
        }
    }
}

#[async_trait]
/// Compresses an ordered list of turns into a short text.
///
/// Implementations own their retry and rate-limit handling; the store treats
/// any error as "leave the run alone and try again on the next pass".
pub trait Summarizer: Send + Sync {
    /// Summarize `turns` into roughly `target_sentences` sentences.
    async fn summarize(
        &self,
        turns: &[Turn],
        target_sentences: usize,
    ) -> Result<String, SummarizerError>;
}
