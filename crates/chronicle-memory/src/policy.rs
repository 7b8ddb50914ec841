//! Compaction tunables.

use std::hash::{Hash, Hasher};

/// Policy deciding when and how much of a run gets summarized.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionPolicy {
    /// Target size of one level, in characters.
    pub characters_per_level: usize,
    /// Sentence count requested from the summarizer.
    pub sentences_per_summary: usize,
    /// Runs shorter than this are never compacted.
    pub min_run_length: usize,
    /// A run is compacted once its size exceeds `characters_per_level * trigger_ratio`.
    pub trigger_ratio: f64,
}

impl CompactionPolicy {
    /// Size a run must exceed before it is compacted.
    pub fn trigger_chars(&self) -> f64 {
        self.characters_per_level as f64 * self.trigger_ratio
    }
}

impl Default for CompactionPolicy {
    /// Default compaction policy settings.
    fn default() -> Self {
        Self {
            characters_per_level: 1000,
            sentences_per_summary: 3,
            min_run_length: 3,
            trigger_ratio: 1.5,
        }
    }
}

impl Eq for CompactionPolicy {}

impl Hash for CompactionPolicy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.characters_per_level.hash(state);
        self.sentences_per_summary.hash(state);
        self.min_run_length.hash(state);
        self.trigger_ratio.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::CompactionPolicy;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_trigger_is_one_and_a_half_levels() {
        let policy = CompactionPolicy::default();
        assert_eq!(policy.trigger_chars(), 1500.0);
        assert_eq!(policy.min_run_length, 3);
    }
}
