use outliner_protocol::{AnchorId, Chunk, OutlineEntry};

/// Where a page instance stands in its labeling lifecycle.
///
/// ```text
/// Empty ──> Segmented ──> Labeling ──> PartiallyLabeled ──> Labeling ──> ... ──> FullyLabeled
///                │                          │                                        │
///                └──────────────────────────┴──────────── Resegmenting <─────────────┘
/// ```
///
/// `Resegmenting` is reachable from any non-empty state when the host asks
/// for a refresh or reports more content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlinePhase {
    #[default]
    Empty,
    Segmented,
    Labeling { start: usize, end: usize },
    PartiallyLabeled,
    FullyLabeled,
    Resegmenting,
}

/// What a re-segmentation pass did to the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Chunk count matched; nothing was touched.
    Unchanged,
    /// The document produced fewer chunks than before. Growth is the only
    /// supported direction, so the existing outline is kept as is and
    /// reinitializing is the recovery path.
    Shrunk { old: usize, new: usize },
    /// New chunks were appended; entries `[start, end)` are pending.
    Appended { start: usize, end: usize },
}

/// The producer-side chunk list and its index-aligned outline.
///
/// Invariant: `entries.len() == chunks.len()` and
/// `entries[i].anchor_id == chunks[i].anchor_id` at every index, after every
/// operation. Labels start as the pending sentinel and are overwritten in
/// place as batches complete.
#[derive(Debug, Default)]
pub struct OutlineState {
    chunks: Vec<Chunk>,
    entries: Vec<OutlineEntry>,
    phase: OutlinePhase,
    generation: u64,
}

impl OutlineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces everything with a fresh segmentation pass. Every entry is
    /// seeded with the pending sentinel. Bumps the generation, which is how
    /// label batches started against the old content get discarded.
    pub fn reset_from(&mut self, chunks: Vec<Chunk>) {
        self.entries = chunks
            .iter()
            .map(|chunk| OutlineEntry::pending(chunk.anchor_id.clone()))
            .collect();
        self.chunks = chunks;
        self.generation += 1;
        self.settle_phase();
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn phase(&self) -> OutlinePhase {
        self.phase
    }

    /// Monotonic counter identifying the current segmentation lineage.
    /// Appends keep it; only [`Self::reset_from`] moves it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    /// Owned copy of the outline as it stands, pending sentinels included.
    pub fn snapshot(&self) -> Vec<OutlineEntry> {
        self.entries.clone()
    }

    /// Text of the first chunk bound to the anchor. Split slices share one
    /// anchor, so "first" is the slice a jump would land on.
    pub fn chunk_text(&self, anchor: &AnchorId) -> Option<&str> {
        self.chunks
            .iter()
            .find(|chunk| &chunk.anchor_id == anchor)
            .map(|chunk| chunk.text.as_str())
    }

    /// Cloned chunk texts for `[start, end)`, in chunk order.
    pub fn chunk_texts(&self, start: usize, end: usize) -> Vec<String> {
        self.chunks[start..end]
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect()
    }

    /// Index of the first entry still holding the pending sentinel.
    pub fn first_pending(&self) -> Option<usize> {
        self.entries.iter().position(OutlineEntry::is_pending)
    }

    /// The next batch to label: `batch_size` entries starting at the first
    /// pending one, clamped to the outline's end. `None` when nothing is
    /// pending.
    pub fn next_batch(&self, batch_size: usize) -> Option<(usize, usize)> {
        let start = self.first_pending()?;
        Some((start, (start + batch_size).min(self.entries.len())))
    }

    pub fn is_fully_labeled(&self) -> bool {
        self.first_pending().is_none()
    }

    pub fn is_labeling(&self) -> bool {
        matches!(self.phase, OutlinePhase::Labeling { .. })
    }

    /// Claims `[start, end)` for a labeling pass. Refuses an empty range and
    /// refuses to overlap a pass already in flight.
    pub fn begin_labeling(&mut self, start: usize, end: usize) -> bool {
        if start >= end || end > self.entries.len() || self.is_labeling() {
            return false;
        }
        self.phase = OutlinePhase::Labeling { start, end };
        true
    }

    /// Writes labels back at `[start, start + labels.len())`, rebuilding each
    /// entry from its chunk so the anchor alignment cannot drift.
    pub fn write_labels(&mut self, start: usize, labels: &[String]) {
        for (offset, label) in labels.iter().enumerate() {
            let index = start + offset;
            if index >= self.entries.len() {
                break;
            }
            self.entries[index] = OutlineEntry::labeled(label, self.chunks[index].anchor_id.clone());
        }
    }

    /// Ends the in-flight labeling pass and recomputes the resting phase.
    pub fn finish_labeling(&mut self) {
        self.settle_phase();
    }

    /// Marks the start of a re-segmentation pass.
    pub fn begin_resegmenting(&mut self) {
        if !self.is_empty() {
            self.phase = OutlinePhase::Resegmenting;
        }
    }

    /// Folds a re-segmentation result in. Documents are treated as
    /// append-only: an equal or smaller chunk count leaves the outline
    /// untouched, a larger one appends the tail as pending entries.
    pub fn apply_rebuild(&mut self, new_chunks: Vec<Chunk>) -> RebuildOutcome {
        let old = self.chunks.len();
        let new = new_chunks.len();
        let outcome = if new > old {
            for chunk in new_chunks.into_iter().skip(old) {
                self.entries.push(OutlineEntry::pending(chunk.anchor_id.clone()));
                self.chunks.push(chunk);
            }
            RebuildOutcome::Appended { start: old, end: new }
        } else if new < old {
            RebuildOutcome::Shrunk { old, new }
        } else {
            RebuildOutcome::Unchanged
        };
        self.settle_phase();
        outcome
    }

    fn settle_phase(&mut self) {
        let pending = self.entries.iter().filter(|e| e.is_pending()).count();
        self.phase = if self.entries.is_empty() {
            OutlinePhase::Empty
        } else if pending == self.entries.len() {
            OutlinePhase::Segmented
        } else if pending == 0 {
            OutlinePhase::FullyLabeled
        } else {
            OutlinePhase::PartiallyLabeled
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered_chunks(count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|i| Chunk::new(format!("chunk text {i}"), format!("a{i}")))
            .collect()
    }

    fn labels(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("label {i}")).collect()
    }

    fn assert_aligned(state: &OutlineState) {
        assert_eq!(state.entries().len(), state.chunks().len());
        for (entry, chunk) in state.entries().iter().zip(state.chunks()) {
            assert_eq!(entry.anchor_id, chunk.anchor_id);
        }
    }

    #[test]
    fn seeding_builds_an_aligned_pending_outline() {
        let mut state = OutlineState::new();
        assert_eq!(state.phase(), OutlinePhase::Empty);

        state.reset_from(numbered_chunks(3));
        assert_eq!(state.len(), 3);
        assert_eq!(state.phase(), OutlinePhase::Segmented);
        assert!(state.entries().iter().all(OutlineEntry::is_pending));
        assert_aligned(&state);
    }

    #[test]
    fn empty_segmentation_settles_back_to_empty() {
        let mut state = OutlineState::new();
        state.reset_from(Vec::new());
        assert_eq!(state.phase(), OutlinePhase::Empty);
        assert!(state.is_fully_labeled());
        assert_eq!(state.next_batch(10), None);
    }

    #[test]
    fn batches_advance_from_the_first_pending_index() {
        let mut state = OutlineState::new();
        state.reset_from(numbered_chunks(25));

        assert_eq!(state.next_batch(10), Some((0, 10)));
        assert!(state.begin_labeling(0, 10));
        state.write_labels(0, &labels(0..10));
        state.finish_labeling();

        assert_eq!(state.next_batch(10), Some((10, 20)));
        assert!(state.begin_labeling(10, 20));
        state.write_labels(10, &labels(10..20));
        state.finish_labeling();

        // The last batch is clamped to the outline's end.
        assert_eq!(state.next_batch(10), Some((20, 25)));
    }

    #[test]
    fn labeling_guard_refuses_overlap_and_clears_on_finish() {
        let mut state = OutlineState::new();
        state.reset_from(numbered_chunks(25));

        assert!(state.begin_labeling(0, 10));
        assert!(state.is_labeling());
        assert!(!state.begin_labeling(10, 20));

        state.write_labels(0, &labels(0..10));
        state.finish_labeling();
        assert!(!state.is_labeling());
        assert_eq!(state.phase(), OutlinePhase::PartiallyLabeled);
        assert!(state.begin_labeling(10, 20));
    }

    #[test]
    fn full_labeling_reaches_the_terminal_phase() {
        let mut state = OutlineState::new();
        state.reset_from(numbered_chunks(4));
        assert!(state.begin_labeling(0, 4));
        state.write_labels(0, &labels(0..4));
        state.finish_labeling();

        assert_eq!(state.phase(), OutlinePhase::FullyLabeled);
        assert!(state.is_fully_labeled());
        assert_aligned(&state);
        assert_eq!(state.entries()[2].label, "label 2");
    }

    #[test]
    fn rebuild_appends_pending_entries_and_keeps_written_labels() {
        let mut state = OutlineState::new();
        state.reset_from(numbered_chunks(5));
        assert!(state.begin_labeling(0, 5));
        state.write_labels(0, &labels(0..5));
        state.finish_labeling();
        let generation = state.generation();

        state.begin_resegmenting();
        assert_eq!(state.phase(), OutlinePhase::Resegmenting);
        let outcome = state.apply_rebuild(numbered_chunks(8));

        assert_eq!(outcome, RebuildOutcome::Appended { start: 5, end: 8 });
        assert_eq!(state.len(), 8);
        assert_eq!(state.generation(), generation);
        assert_eq!(state.phase(), OutlinePhase::PartiallyLabeled);
        for i in 0..5 {
            assert_eq!(state.entries()[i].label, format!("label {i}"));
        }
        for i in 5..8 {
            assert!(state.entries()[i].is_pending());
        }
        assert_aligned(&state);
        assert_eq!(state.first_pending(), Some(5));
    }

    #[test]
    fn rebuild_without_growth_mutates_nothing() {
        let mut state = OutlineState::new();
        state.reset_from(numbered_chunks(5));
        assert!(state.begin_labeling(0, 5));
        state.write_labels(0, &labels(0..5));
        state.finish_labeling();
        let before = state.snapshot();

        state.begin_resegmenting();
        assert_eq!(state.apply_rebuild(numbered_chunks(5)), RebuildOutcome::Unchanged);
        assert_eq!(state.snapshot(), before);
        assert_eq!(state.phase(), OutlinePhase::FullyLabeled);

        state.begin_resegmenting();
        assert_eq!(
            state.apply_rebuild(numbered_chunks(3)),
            RebuildOutcome::Shrunk { old: 5, new: 3 }
        );
        assert_eq!(state.snapshot(), before);
        assert_eq!(state.len(), 5);
    }

    #[test]
    fn only_reseeding_moves_the_generation() {
        let mut state = OutlineState::new();
        state.reset_from(numbered_chunks(2));
        let first = state.generation();

        state.apply_rebuild(numbered_chunks(4));
        assert_eq!(state.generation(), first);

        state.reset_from(numbered_chunks(2));
        assert_eq!(state.generation(), first + 1);
    }

    #[test]
    fn chunk_text_finds_the_first_slice_of_a_shared_anchor() {
        let mut state = OutlineState::new();
        state.reset_from(vec![
            Chunk::new("lead slice", "shared"),
            Chunk::new("tail slice", "shared"),
            Chunk::new("other", "solo"),
        ]);

        assert_eq!(state.chunk_text(&AnchorId::from("shared")), Some("lead slice"));
        assert_eq!(state.chunk_text(&AnchorId::from("solo")), Some("other"));
        assert_eq!(state.chunk_text(&AnchorId::from("gone")), None);
    }

    #[test]
    fn write_labels_stops_at_the_outline_end() {
        let mut state = OutlineState::new();
        state.reset_from(numbered_chunks(3));
        state.write_labels(2, &labels(0..5));
        assert_eq!(state.entries()[2].label, "label 0");
        assert_eq!(state.len(), 3);
        assert_aligned(&state);
    }
}
