//! Ordered transcript ledger.
//!
//! Committed segments sorted by start position, with atomic
//! replace-many-with-one updates and on-demand prompt-context derivation.
//! The prompt view is derived from the committed segments rather than kept as
//! a parallel history, so the two can never diverge.

use crate::streaming::types::TranscriptSegment;
use std::collections::HashSet;

/// Mutable, ordered ledger of committed transcript segments.
#[derive(Debug, Default)]
pub struct ResultTimeline {
    /// Sorted by `(start, id)`.
    segments: Vec<TranscriptSegment>,
    /// Ids targeted by an issued-but-uncommitted reprocessing pass. Their
    /// text is about to be replaced and must not leak into prompts.
    pending_replacement: HashSet<u64>,
}

impl ResultTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically removes every segment whose id is in `replaces` and inserts
    /// `segment`, keeping start order.
    pub fn commit(&mut self, segment: TranscriptSegment, replaces: &[u64]) {
        if !replaces.is_empty() {
            self.segments.retain(|s| !replaces.contains(&s.id));
        }
        let key = (segment.start, segment.id);
        let pos = self
            .segments
            .partition_point(|s| (s.start, s.id) <= key);
        self.segments.insert(pos, segment);
    }

    /// Ordered copy of the committed segments. Pure read.
    pub fn snapshot(&self) -> Vec<TranscriptSegment> {
        self.segments.clone()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Concatenates the text of the last `count` stable segments ending at or
    /// before `before`.
    ///
    /// Segments pending replacement are excluded (their text is about to be
    /// superseded), as are empty-text fallback segments.
    pub fn prompt_context(&self, before: u64, count: usize) -> String {
        if count == 0 {
            return String::new();
        }
        let texts: Vec<&str> = self
            .segments
            .iter()
            .filter(|s| {
                s.end <= before
                    && !self.pending_replacement.contains(&s.id)
                    && !s.text.is_empty()
            })
            .map(|s| s.text.as_str())
            .collect();
        let skip = texts.len().saturating_sub(count);
        texts[skip..].join(" ")
    }

    /// Marks ids as targeted by an issued reprocessing pass.
    pub fn mark_pending_replacement(&mut self, ids: &[u64]) {
        self.pending_replacement.extend(ids.iter().copied());
    }

    /// Clears the pending-replacement mark for the given ids (the pass
    /// committed or will never commit).
    pub fn clear_pending_replacement(&mut self, ids: &[u64]) {
        for id in ids {
            self.pending_replacement.remove(id);
        }
    }

    /// Clears every pending-replacement mark (session stop).
    pub fn clear_all_pending_replacements(&mut self) {
        self.pending_replacement.clear();
    }

    /// Number of ids currently pending replacement.
    pub fn pending_replacement_len(&self) -> usize {
        self.pending_replacement.len()
    }

    /// Drops all segments and marks (session reset).
    pub fn clear(&mut self) {
        self.segments.clear();
        self.pending_replacement.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: u64, start: u64, end: u64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            id,
            start,
            end,
            text: text.to_string(),
            is_reprocessed: false,
            replaces: Vec::new(),
        }
    }

    #[test]
    fn test_commit_keeps_start_order() {
        let mut timeline = ResultTimeline::new();
        timeline.commit(segment(1, 100, 200, "b"), &[]);
        timeline.commit(segment(0, 0, 100, "a"), &[]);
        timeline.commit(segment(2, 200, 300, "c"), &[]);

        let texts: Vec<String> = timeline.snapshot().into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_replace_is_atomic() {
        let mut timeline = ResultTimeline::new();
        timeline.commit(segment(0, 0, 100, "a"), &[]);
        timeline.commit(segment(1, 100, 200, "b"), &[]);
        timeline.commit(segment(2, 200, 300, "c"), &[]);

        let mut merged = segment(3, 100, 300, "bc");
        merged.is_reprocessed = true;
        merged.replaces = vec![1, 2];
        timeline.commit(merged, &[1, 2]);

        let snapshot = timeline.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].text, "a");
        assert_eq!(snapshot[1].text, "bc");
        assert_eq!(snapshot[1].start, 100);
        assert_eq!(snapshot[1].end, 300);
    }

    #[test]
    fn test_replace_leaves_no_overlap() {
        let mut timeline = ResultTimeline::new();
        timeline.commit(segment(0, 0, 100, "a"), &[]);
        timeline.commit(segment(1, 100, 200, "b"), &[]);
        timeline.commit(segment(2, 100, 250, "merged"), &[1]);

        let snapshot = timeline.snapshot();
        for pair in snapshot.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn test_prompt_context_takes_last_n_before_boundary() {
        let mut timeline = ResultTimeline::new();
        timeline.commit(segment(0, 0, 100, "one"), &[]);
        timeline.commit(segment(1, 100, 200, "two"), &[]);
        timeline.commit(segment(2, 200, 300, "three"), &[]);

        assert_eq!(timeline.prompt_context(300, 2), "two three");
        assert_eq!(timeline.prompt_context(200, 2), "one two");
        assert_eq!(timeline.prompt_context(100, 2), "one");
        assert_eq!(timeline.prompt_context(50, 2), "");
        assert_eq!(timeline.prompt_context(300, 0), "");
    }

    #[test]
    fn test_prompt_context_excludes_pending_replacement() {
        let mut timeline = ResultTimeline::new();
        timeline.commit(segment(0, 0, 100, "stable"), &[]);
        timeline.commit(segment(1, 100, 200, "doomed"), &[]);
        timeline.mark_pending_replacement(&[1]);

        assert_eq!(timeline.prompt_context(200, 2), "stable");

        timeline.clear_pending_replacement(&[1]);
        assert_eq!(timeline.prompt_context(200, 2), "stable doomed");
    }

    #[test]
    fn test_prompt_context_skips_empty_segments() {
        let mut timeline = ResultTimeline::new();
        timeline.commit(segment(0, 0, 100, "kept"), &[]);
        timeline.commit(segment(1, 100, 200, ""), &[]);

        assert_eq!(timeline.prompt_context(200, 2), "kept");
    }

    #[test]
    fn test_clear_all_pending_replacements() {
        let mut timeline = ResultTimeline::new();
        timeline.mark_pending_replacement(&[1, 2, 3]);
        assert_eq!(timeline.pending_replacement_len(), 3);

        timeline.clear_all_pending_replacements();
        assert_eq!(timeline.pending_replacement_len(), 0);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut timeline = ResultTimeline::new();
        timeline.commit(segment(0, 0, 100, "a"), &[]);
        timeline.mark_pending_replacement(&[0]);

        timeline.clear();
        assert!(timeline.is_empty());
        assert_eq!(timeline.pending_replacement_len(), 0);
    }
}
