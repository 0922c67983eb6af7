// src/analysis/trends.rs
//! Correlation and state-change heuristics over state sequences
//!
//! Both operate on leaf paths resolved with [`lookup`]. The correlation
//! classification is a heuristic, not a significance test.

use crate::analysis::aggregator::occurrence_timestamp;
use crate::analysis::diff::lookup;
use crate::recording::event::Value;
use serde::Serialize;
use std::fmt;

/// Fewer samples than this yield no correlation
pub const MIN_CORRELATION_SAMPLES: usize = 6;

const STRONG_THRESHOLD: f64 = 0.7;
const MODERATE_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    StrongPositive,
    Positive,
    StrongNegative,
    Negative,
    Weak,
}

impl Relationship {
    pub fn classify(coefficient: f64) -> Self {
        if coefficient > STRONG_THRESHOLD {
            Relationship::StrongPositive
        } else if coefficient > MODERATE_THRESHOLD {
            Relationship::Positive
        } else if coefficient < -STRONG_THRESHOLD {
            Relationship::StrongNegative
        } else if coefficient < -MODERATE_THRESHOLD {
            Relationship::Negative
        } else {
            Relationship::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::StrongPositive => "strong positive",
            Relationship::Positive => "positive",
            Relationship::StrongNegative => "strong negative",
            Relationship::Negative => "negative",
            Relationship::Weak => "weak",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pearson correlation between two numeric leaves
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub key_a: String,

    pub key_b: String,

    pub coefficient: f64,

    /// States where both leaves were numeric
    pub samples: usize,

    pub relationship: Relationship,
}

/// Correlate two leaf paths across `states`
///
/// Only states where both leaves are numbers count as samples. Returns
/// `None` below [`MIN_CORRELATION_SAMPLES`] or when either series is constant.
pub fn correlate(states: &[Value], key_a: &str, key_b: &str) -> Option<Correlation> {
    let pairs: Vec<(f64, f64)> = states
        .iter()
        .filter_map(|state| {
            let a = lookup(state, key_a)?.as_f64()?;
            let b = lookup(state, key_b)?.as_f64()?;
            Some((a, b))
        })
        .collect();

    if pairs.len() < MIN_CORRELATION_SAMPLES {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let (da, db) = (a - mean_a, b - mean_b);
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    let coefficient = (cov / denominator).clamp(-1.0, 1.0);
    Some(Correlation {
        key_a: key_a.to_string(),
        key_b: key_b.to_string(),
        coefficient,
        samples: pairs.len(),
        relationship: Relationship::classify(coefficient),
    })
}

/// One notable transition of a single leaf
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    /// Index of the later state
    pub index: usize,

    pub timestamp: Value,

    pub old: Option<Value>,

    pub new: Option<Value>,

    /// `new - old` when both are numbers
    pub delta: Option<f64>,
}

/// Transitions where `key` moved by more than `threshold`
///
/// Numeric leaves compare by absolute delta; anything else (including a leaf
/// appearing or disappearing) counts when the values differ.
pub fn detect_state_changes(states: &[Value], key: &str, threshold: f64) -> Vec<StateChange> {
    let mut changes = Vec::new();

    for (i, pair) in states.windows(2).enumerate() {
        let old = lookup(&pair[0], key);
        let new = lookup(&pair[1], key);

        let (changed, delta) = match (old, new) {
            (None, None) => continue,
            (Some(o), Some(n)) => match (o.as_f64(), n.as_f64()) {
                (Some(o), Some(n)) => ((n - o).abs() > threshold, Some(n - o)),
                _ => (o != n, None),
            },
            _ => (true, None),
        };

        if changed {
            changes.push(StateChange {
                index: i + 1,
                timestamp: occurrence_timestamp(&pair[1], i + 1),
                old: old.cloned(),
                new: new.cloned(),
                delta,
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(pairs: &[(f64, f64)]) -> Vec<Value> {
        pairs
            .iter()
            .map(|(hp, wet)| json!({"player": {"health": hp, "wetness": wet}}))
            .collect()
    }

    #[test]
    fn test_strong_negative_correlation() {
        let states = series(&[
            (100.0, 0.0),
            (95.0, 10.0),
            (90.0, 20.0),
            (85.0, 30.0),
            (80.0, 40.0),
            (75.0, 50.0),
        ]);

        let corr = correlate(&states, "player.health", "player.wetness").unwrap();

        assert!((corr.coefficient + 1.0).abs() < 1e-9);
        assert_eq!(corr.samples, 6);
        assert_eq!(corr.relationship, Relationship::StrongNegative);
    }

    #[test]
    fn test_too_few_samples() {
        let states = series(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0), (5.0, 5.0)]);
        assert!(correlate(&states, "player.health", "player.wetness").is_none());
    }

    #[test]
    fn test_constant_series_has_no_correlation() {
        let states = series(&[(1.0, 5.0); 8]);
        assert!(correlate(&states, "player.health", "player.wetness").is_none());
    }

    #[test]
    fn test_non_numeric_samples_skipped() {
        let mut states = series(&[
            (1.0, 2.0),
            (2.0, 4.0),
            (3.0, 6.0),
            (4.0, 8.0),
            (5.0, 10.0),
            (6.0, 12.0),
        ]);
        states.push(json!({"player": {"health": "dead", "wetness": 1}}));

        let corr = correlate(&states, "player.health", "player.wetness").unwrap();
        assert_eq!(corr.samples, 6);
        assert_eq!(corr.relationship, Relationship::StrongPositive);
    }

    #[test]
    fn test_classification_bands() {
        assert_eq!(Relationship::classify(0.5), Relationship::Positive);
        assert_eq!(Relationship::classify(-0.5), Relationship::Negative);
        assert_eq!(Relationship::classify(0.1), Relationship::Weak);
        assert_eq!(Relationship::classify(-0.71).to_string(), "strong negative");
    }

    #[test]
    fn test_detect_state_changes() {
        let states = vec![
            json!({"_timestamp": 1.0, "player": {"health": 100, "mode": "walk"}}),
            json!({"_timestamp": 2.0, "player": {"health": 99, "mode": "walk"}}),
            json!({"_timestamp": 3.0, "player": {"health": 80, "mode": "swim"}}),
            json!({"_timestamp": 4.0, "player": {"mode": "swim"}}),
        ];

        let health = detect_state_changes(&states, "player.health", 5.0);
        assert_eq!(health.len(), 2);
        assert_eq!(health[0].index, 2);
        assert_eq!(health[0].delta, Some(-19.0));
        assert_eq!(health[0].timestamp, json!(3.0));
        assert_eq!(health[1].new, None);

        let mode = detect_state_changes(&states, "player.mode", 0.0);
        assert_eq!(mode.len(), 1);
        assert_eq!(mode[0].new, Some(json!("swim")));
    }
}
