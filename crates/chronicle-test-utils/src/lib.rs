//! Test helpers shared across chronicle crates.

pub mod messages;
pub mod summarizer;

pub use messages::{assistant, system, user};
pub use summarizer::{FailingSummarizer, FixedSummarizer, FlakySummarizer, RecordingSummarizer};
