// src/analysis/comparator.rs
//! Binary-tree sequence comparator
//!
//! Compares two ordered sequences by diffing their midpoints and recursing
//! into the left and right halves:
//!
//! ```text
//! a: [a0 a1 a2 | a3 | a4 a5 a6]        diff(a3, b2)
//! b: [b0 b1 | b2 | b3 b4]                ├─ left:  [a0 a1 a2] × [b0 b1]
//!                                        └─ right: [a4 a5 a6] × [b3 b4]
//! ```
//!
//! Depth is logarithmic and only one pair is diffed per call, so this samples
//! representative pairs instead of the full `n × m` cross product. It does not
//! find every pairwise change.

use crate::analysis::diff::{ChangeSet, DiffEngine};
use crate::analysis::duple::PatternCount;
use crate::recording::event::Value;
use serde::Serialize;
use tracing::debug;

/// Result of one comparison
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonResult {
    /// Diff of the two midpoints at the top level (`None` if a side was empty)
    pub central_patterns: Option<ChangeSet>,

    /// Every diff performed, top level first, then left, then right
    pub all_changesets: Vec<ChangeSet>,

    /// Duple counts summed over every diff
    pub pattern_counts: PatternCount,

    /// Number of diffs performed
    pub comparisons: usize,
}

impl ComparisonResult {
    pub fn is_empty(&self) -> bool {
        self.comparisons == 0
    }
}

/// Divide-and-conquer comparator
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceComparator {
    engine: DiffEngine,
}

impl SequenceComparator {
    pub fn new(engine: DiffEngine) -> Self {
        Self { engine }
    }

    pub fn compare_sequences(&self, a: &[Value], b: &[Value]) -> ComparisonResult {
        let result = self.compare(a, b);
        debug!(
            "Compared sequences of {} and {} items with {} diffs ({} distinct duples)",
            a.len(),
            b.len(),
            result.comparisons,
            result.pattern_counts.len()
        );
        result
    }

    fn compare(&self, a: &[Value], b: &[Value]) -> ComparisonResult {
        if a.is_empty() || b.is_empty() {
            return ComparisonResult::default();
        }

        let mid_a = a.len() / 2;
        let mid_b = b.len() / 2;

        let central = self.engine.diff(&a[mid_a], &b[mid_b]);
        let mut pattern_counts: PatternCount = central
            .duples(self.engine.options().max_cooccurrence_keys)
            .into_iter()
            .collect();

        let mut result = ComparisonResult {
            central_patterns: None,
            all_changesets: vec![central.clone()],
            pattern_counts: PatternCount::new(),
            comparisons: 1,
        };

        if a.len() > 1 && b.len() > 1 {
            let halves = [
                self.compare(&a[..mid_a], &b[..mid_b]),
                self.compare(&a[mid_a + 1..], &b[mid_b + 1..]),
            ];
            for half in halves {
                result.all_changesets.extend(half.all_changesets);
                pattern_counts.merge(&half.pattern_counts);
                result.comparisons += half.comparisons;
            }
        }

        result.central_patterns = Some(central);
        result.pattern_counts = pattern_counts;
        result
    }
}

/// Compare with default diff options
pub fn compare_sequences(a: &[Value], b: &[Value]) -> ComparisonResult {
    SequenceComparator::default().compare_sequences(a, b)
}
