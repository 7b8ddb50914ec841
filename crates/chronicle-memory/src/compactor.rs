//! Threshold-triggered summarization of runs.

use crate::entry_log::EntryLog;
use crate::error::{MemoryError, SummarizerError};
use crate::model::{MEMORY_AUTHOR, MemoryEntry, NewEntry};
use crate::policy::CompactionPolicy;
use crate::runs::partition_runs;
use crate::summarizer::{Summarizer, Turn};
use log::{debug, info, warn};

/// Result of compacting every run of a session once.
#[derive(Debug, Default)]
pub struct CompactionPass {
    /// Surviving entries, run by run.
    pub entries: Vec<MemoryEntry>,
    /// Number of runs replaced by a summary.
    pub compacted: usize,
    /// Summarizer failures; the affected runs were left untouched.
    pub failures: Vec<SummarizerError>,
}

/// Applies a [`CompactionPolicy`] to runs, committing summaries to a log.
pub struct Compactor<'a> {
    log: &'a dyn EntryLog,
    summarizer: &'a dyn Summarizer,
    policy: &'a CompactionPolicy,
}

impl<'a> Compactor<'a> {
    pub fn new(
        log: &'a dyn EntryLog,
        summarizer: &'a dyn Summarizer,
        policy: &'a CompactionPolicy,
    ) -> Self {
        Self {
            log,
            summarizer,
            policy,
        }
    }

    /// True when a run is long and large enough to be summarized.
    pub fn should_compact(&self, run: &[MemoryEntry]) -> bool {
        let total: usize = run.iter().map(MemoryEntry::char_len).sum();
        run.len() >= self.policy.min_run_length && total as f64 > self.policy.trigger_chars()
    }

    /// Partition ordered entries into runs and compact each of them.
    ///
    /// Summarizer failures are recorded and the run passes through unchanged;
    /// storage failures abort the pass.
    pub async fn compact_entries(
        &self,
        entries: Vec<MemoryEntry>,
    ) -> Result<CompactionPass, MemoryError> {
        let mut pass = CompactionPass::default();
        for run in partition_runs(entries) {
            let before = run.first().map(|entry| entry.id);
            match self.compact_run(run.clone()).await {
                Ok(out) => {
                    if out.first().map(|entry| entry.id) != before {
                        pass.compacted += 1;
                    }
                    pass.entries.extend(out);
                }
                Err(MemoryError::Summarization(err)) => {
                    warn!(
                        "skipping run compaction (session_id={}, run_len={}): {err}",
                        run[0].session_id,
                        run.len()
                    );
                    pass.failures.push(err);
                    pass.entries.extend(run);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(pass)
    }

    /// Compact one run if it crosses the trigger, returning its surviving entries.
    ///
    /// On summarizer failure nothing is deleted and the error is returned.
    pub async fn compact_run(
        &self,
        mut run: Vec<MemoryEntry>,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        if !self.should_compact(&run) {
            return Ok(run);
        }
        let split = split_point(&run, self.policy.characters_per_level);
        let keep = run.split_off(split);
        let to_compact = run;

        let turns: Vec<Turn> = to_compact
            .iter()
            .map(|entry| Turn::new(entry.author.clone(), entry.content.clone()))
            .collect();
        debug!(
            "summarizing run prefix (session_id={}, entries={}, kept={})",
            to_compact[0].session_id,
            to_compact.len(),
            keep.len()
        );
        let summary = self
            .summarizer
            .summarize(&turns, self.policy.sentences_per_summary)
            .await?;

        let level = to_compact
            .iter()
            .map(|entry| entry.level)
            .min()
            .unwrap_or_default()
            + 1;
        let replacement = NewEntry {
            session_id: to_compact[0].session_id.clone(),
            author: MEMORY_AUTHOR.to_string(),
            timestamp_ms: to_compact[to_compact.len() / 2].timestamp_ms,
            content: summary,
            level,
        };
        let removed: Vec<_> = to_compact.iter().map(|entry| entry.id).collect();
        let inserted = self.log.swap(&removed, replacement)?;
        info!(
            "memory compacted (session_id={}, removed={}, level={}, summary_id={})",
            inserted.session_id,
            removed.len(),
            inserted.level,
            inserted.id
        );

        let mut out = Vec::with_capacity(keep.len() + 1);
        out.push(inserted);
        out.extend(keep);
        Ok(out)
    }
}

/// Length of the oldest prefix that fits in `budget` characters, never below one.
pub fn split_point(run: &[MemoryEntry], budget: usize) -> usize {
    let mut total = 0;
    let mut split = 0;
    for entry in run {
        total += entry.char_len();
        if total > budget {
            break;
        }
        split += 1;
    }
    split.clamp(1, run.len().max(1))
}

#[cfg(test)]
mod tests {
    use super::{Compactor, split_point};
    use crate::entry_log::{EntryLog, SqliteEntryLog};
    use crate::error::{MemoryError, SummarizerError};
    use crate::model::{MEMORY_AUTHOR, MemoryEntry, NewEntry};
    use crate::policy::CompactionPolicy;
    use crate::summarizer::{Summarizer, Turn};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Echo;

    #[async_trait]
    impl Summarizer for Echo {
        async fn summarize(
            &self,
            turns: &[Turn],
            target_sentences: usize,
        ) -> Result<String, SummarizerError> {
            Ok(format!("{} turns in {target_sentences}", turns.len()))
        }
    }

    struct Down;

    #[async_trait]
    impl Summarizer for Down {
        async fn summarize(
            &self,
            _turns: &[Turn],
            _target_sentences: usize,
        ) -> Result<String, SummarizerError> {
            Err(SummarizerError::RateLimited("slow down".to_string()))
        }
    }

    fn policy() -> CompactionPolicy {
        CompactionPolicy {
            characters_per_level: 20,
            sentences_per_summary: 2,
            min_run_length: 3,
            trigger_ratio: 1.5,
        }
    }

    fn seed(log: &SqliteEntryLog, items: &[(&str, u32)]) -> Vec<MemoryEntry> {
        items
            .iter()
            .enumerate()
            .map(|(idx, (content, level))| {
                let mut entry = NewEntry::raw("s", "Ana", *content, idx as i64 * 10);
                entry.level = *level;
                let id = log.append(entry.clone()).expect("append");
                entry.persisted(id)
            })
            .collect()
    }

    #[test]
    fn split_point_keeps_prefix_within_budget() {
        let log = SqliteEntryLog::open_in_memory().expect("log");
        let run = seed(&log, &[("aaaaaaaaaa", 0), ("bbbbbbbbbb", 0), ("cccccccccc", 0)]);
        assert_eq!(split_point(&run, 20), 2);
        assert_eq!(split_point(&run, 25), 2);
        assert_eq!(split_point(&run, 5), 1);
    }

    #[tokio::test]
    async fn short_or_small_runs_pass_through() {
        let log = SqliteEntryLog::open_in_memory().expect("log");
        let policy = policy();
        let compactor = Compactor::new(&log, &Echo, &policy);

        let small = seed(&log, &[("a", 0), ("b", 0), ("c", 0)]);
        assert_eq!(compactor.compact_run(small.clone()).await.expect("run"), small);

        log.delete_all().expect("reset");
        let short = seed(&log, &[("x".repeat(40).as_str(), 0), ("y", 0)]);
        assert_eq!(compactor.compact_run(short.clone()).await.expect("run"), short);
        assert_eq!(log.fetch_ordered("s").expect("fetch").len(), 2);
    }

    #[tokio::test]
    async fn oversized_run_is_replaced_by_summary() {
        let log = SqliteEntryLog::open_in_memory().expect("log");
        let policy = policy();
        let compactor = Compactor::new(&log, &Echo, &policy);
        let run = seed(
            &log,
            &[
                ("aaaaaaaaaa", 0),
                ("bbbbbbbbbb", 0),
                ("cccccccccc", 0),
                ("dddddddddd", 0),
            ],
        );

        let out = compactor.compact_run(run.clone()).await.expect("compact");
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].author, MEMORY_AUTHOR);
        assert_eq!(out[0].content, "2 turns in 2");
        assert_eq!(out[0].level, 1);
        assert_eq!(out[0].timestamp_ms, run[1].timestamp_ms);
        assert_eq!(&out[1..], &run[2..]);

        let stored = log.fetch_ordered("s").expect("fetch");
        assert_eq!(stored, out);
    }

    #[tokio::test]
    async fn summary_level_is_one_above_prefix_minimum() {
        let log = SqliteEntryLog::open_in_memory().expect("log");
        let policy = policy();
        let compactor = Compactor::new(&log, &Echo, &policy);
        let run = seed(
            &log,
            &[("aaaaaaaaaa", 1), ("bbbbbbbbbb", 2), ("cccccccccc", 2), ("dddddddddd", 3)],
        );

        let out = compactor.compact_run(run).await.expect("compact");
        assert_eq!(out[0].level, 2);
    }

    #[tokio::test]
    async fn failed_summary_leaves_run_intact() {
        let log = SqliteEntryLog::open_in_memory().expect("log");
        let policy = policy();
        let compactor = Compactor::new(&log, &Down, &policy);
        let run = seed(
            &log,
            &[("aaaaaaaaaa", 0), ("bbbbbbbbbb", 0), ("cccccccccc", 0), ("dddddddddd", 0)],
        );

        let err = compactor.compact_run(run.clone()).await.unwrap_err();
        assert!(matches!(err, MemoryError::Summarization(_)));
        assert_eq!(log.fetch_ordered("s").expect("fetch"), run);

        let pass = compactor.compact_entries(run.clone()).await.expect("pass");
        assert_eq!(pass.entries, run);
        assert_eq!(pass.compacted, 0);
        assert_eq!(pass.failures.len(), 1);
    }

    #[tokio::test]
    async fn each_run_is_compacted_independently() {
        let log = SqliteEntryLog::open_in_memory().expect("log");
        let policy = policy();
        let compactor = Compactor::new(&log, &Echo, &policy);
        let entries = seed(
            &log,
            &[
                ("old summary", 1),
                ("aaaaaaaaaa", 0),
                ("bbbbbbbbbb", 0),
                ("cccccccccc", 0),
                ("dddddddddd", 0),
            ],
        );

        let pass = compactor.compact_entries(entries).await.expect("pass");
        assert_eq!(pass.compacted, 1);
        let levels: Vec<_> = pass.entries.iter().map(|entry| entry.level).collect();
        assert_eq!(levels, vec![1, 1, 0, 0]);
        assert_eq!(pass.entries[0].content, "old summary");
    }
}
