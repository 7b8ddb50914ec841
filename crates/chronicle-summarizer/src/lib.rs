//! Summarizer backed by an OpenAI-compatible chat-completions endpoint.
//!
//! Groq is the default provider; any server speaking the same wire protocol
//! works by pointing `summarizer.base_url` at it.

mod chat;
mod prompt;

/// Chat-completions summarizer.
pub use chat::ChatCompletionSummarizer;
/// Prompt helpers, exposed for callers that want to preview requests.
pub use prompt::{clean_summary, compression_prompt, render_turns};
