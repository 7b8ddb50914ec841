use async_trait::async_trait;
use chronicle_memory::{Summarizer, SummarizerError, Turn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns the same summary for every call.
#[derive(Debug, Clone)]
pub struct FixedSummarizer {
    summary: String,
}

impl FixedSummarizer {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(
        &self,
        _turns: &[Turn],
        _target_sentences: usize,
    ) -> Result<String, SummarizerError> {
        Ok(self.summary.clone())
    }
}

/// Fails every call.
#[derive(Debug, Clone)]
pub struct FailingSummarizer {
    error: SummarizerError,
}

impl FailingSummarizer {
    pub fn new(error: SummarizerError) -> Self {
        Self { error }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(SummarizerError::Provider(message.into()))
    }
}

#[async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(
        &self,
        _turns: &[Turn],
        _target_sentences: usize,
    ) -> Result<String, SummarizerError> {
        Err(self.error.clone())
    }
}

/// Fails the first `failures` calls with a rate-limit error, then succeeds.
#[derive(Debug)]
pub struct FlakySummarizer {
    failures: usize,
    calls: AtomicUsize,
    summary: String,
}

impl FlakySummarizer {
    pub fn new(failures: usize, summary: impl Into<String>) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
            summary: summary.into(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FlakySummarizer {
    async fn summarize(
        &self,
        _turns: &[Turn],
        _target_sentences: usize,
    ) -> Result<String, SummarizerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(SummarizerError::RateLimited(format!("call {call}")));
        }
        Ok(self.summary.clone())
    }
}

/// Records every request and answers with a numbered summary.
#[derive(Debug, Clone, Default)]
pub struct RecordingSummarizer {
    requests: Arc<Mutex<Vec<(Vec<Turn>, usize)>>>,
}

impl RecordingSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(turns, target_sentences)` pairs in call order.
    pub fn requests(&self) -> Vec<(Vec<Turn>, usize)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(
        &self,
        turns: &[Turn],
        target_sentences: usize,
    ) -> Result<String, SummarizerError> {
        let mut requests = self.requests.lock();
        requests.push((turns.to_vec(), target_sentences));
        Ok(format!("summary {}", requests.len()))
    }
}
