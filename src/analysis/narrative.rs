// src/analysis/narrative.rs
//! Human-readable pattern reports

use crate::analysis::duple::{Duple, PatternCount};
use crate::analysis::trends::Correlation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// Default number of patterns listed in a report
pub const DEFAULT_TOP_PATTERNS: usize = 10;

/// One ranked pattern
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternLine {
    pub duple: Duple,

    pub count: usize,
}

impl PatternLine {
    /// "`health` frequently changed with `wetness` (3 times)"
    pub fn sentence(&self) -> String {
        format!(
            "`{}` frequently changed with `{}` ({} {})",
            leaf(self.duple.first()),
            leaf(self.duple.second()),
            self.count,
            if self.count == 1 { "time" } else { "times" }
        )
    }
}

/// Narrative summary of the patterns found in one or more sessions
#[derive(Debug, Clone, Serialize)]
pub struct PatternReport {
    pub session_ids: Vec<String>,

    pub generated_at: DateTime<Utc>,

    pub snapshots_analyzed: usize,

    /// Most frequent duples, highest count first
    pub patterns: Vec<PatternLine>,

    pub correlations: Vec<Correlation>,
}

impl PatternReport {
    /// Rank `counts` and keep the `top_n` most frequent duples
    pub fn build(
        session_ids: Vec<String>,
        snapshots_analyzed: usize,
        counts: &PatternCount,
        top_n: usize,
    ) -> Self {
        let patterns = counts
            .most_common(top_n)
            .into_iter()
            .map(|(duple, count)| PatternLine { duple, count })
            .collect();

        Self {
            session_ids,
            generated_at: Utc::now(),
            snapshots_analyzed,
            patterns,
            correlations: Vec::new(),
        }
    }

    pub fn with_correlations(mut self, correlations: Vec<Correlation>) -> Self {
        self.correlations = correlations;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.correlations.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# Pattern Report");
        let _ = writeln!(out);
        let _ = writeln!(out, "- Sessions: {}", self.session_ids.join(", "));
        let _ = writeln!(out, "- Snapshots analyzed: {}", self.snapshots_analyzed);
        let _ = writeln!(
            out,
            "- Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "## Patterns");
        let _ = writeln!(out);
        if self.patterns.is_empty() {
            let _ = writeln!(out, "No recurring patterns found.");
        } else {
            for line in &self.patterns {
                let _ = writeln!(out, "- {}", line.sentence());
            }
        }

        if !self.correlations.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Correlations");
            let _ = writeln!(out);
            for corr in &self.correlations {
                let _ = writeln!(
                    out,
                    "- `{}` and `{}`: {} ({:.2} over {} samples)",
                    corr.key_a, corr.key_b, corr.relationship, corr.coefficient, corr.samples
                );
            }
        }

        out
    }
}

/// Last segment of a dotted path
fn leaf(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}
