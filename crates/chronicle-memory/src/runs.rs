//! Run detection over a session's ordered entries.

use crate::model::MemoryEntry;

/// Split ordered entries into maximal runs of non-decreasing level.
///
/// Summaries keep the timestamp of the middle entry they replaced, so a
/// session usually reads as older summaries of rising level followed by a raw
/// tail. A drop in level marks where that tail starts.
pub fn partition_runs(entries: Vec<MemoryEntry>) -> Vec<Vec<MemoryEntry>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    let mut last_level = 0;
    for entry in entries {
        if entry.level < last_level {
            runs.push(std::mem::take(&mut current));
        }
        last_level = entry.level;
        current.push(entry);
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}
