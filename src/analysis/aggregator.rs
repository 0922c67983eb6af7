// src/analysis/aggregator.rs
//! Duple aggregation over consecutive snapshot transitions
//!
//! ```text
//! s0 ──diff──→ s1 ──diff──→ s2 ──diff──→ s3
//!      {a,b}        {a,b,c}       {c}
//!        │            │
//!        └── a:b ×2, a:c ×1, b:c ×1 ──→ keep count ≥ min_occurrences
//! ```

use crate::analysis::diff::{Change, DiffEngine};
use crate::analysis::duple::{Duple, PatternCount};
use crate::recording::event::Value;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One transition where both keys of a duple changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DupleOccurrence {
    /// `_timestamp` of the later state, else its `timestamp`, else the state index
    pub timestamp: Value,

    /// Change of each of the two keys
    #[serde(flatten)]
    pub changes: BTreeMap<String, Change>,
}

/// Occurrences per duple, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct DupleReport {
    entries: Vec<(Duple, Vec<DupleOccurrence>)>,
    index: HashMap<Duple, usize>,
}

impl DupleReport {
    fn record(&mut self, duple: Duple, occurrence: DupleOccurrence) {
        match self.index.get(&duple) {
            Some(&slot) => self.entries[slot].1.push(occurrence),
            None => {
                self.index.insert(duple.clone(), self.entries.len());
                self.entries.push((duple, vec![occurrence]));
            }
        }
    }

    fn retain_min(&mut self, min_occurrences: usize) {
        self.entries.retain(|(_, occ)| occ.len() >= min_occurrences);
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, (duple, _))| (duple.clone(), slot))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, duple: &Duple) -> Option<&[DupleOccurrence]> {
        self.index
            .get(duple)
            .map(|&slot| self.entries[slot].1.as_slice())
    }

    /// Look up by `"k1:k2"` id, in either key order
    pub fn get_id(&self, id: &str) -> Option<&[DupleOccurrence]> {
        let (a, b) = id.split_once(crate::analysis::duple::DUPLE_SEPARATOR)?;
        self.get(&Duple::new(a, b))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Duple, &[DupleOccurrence])> {
        self.entries.iter().map(|(d, occ)| (d, occ.as_slice()))
    }

    /// Occurrence count per duple
    pub fn pattern_counts(&self) -> PatternCount {
        let mut counts = PatternCount::new();
        for (duple, occ) in &self.entries {
            counts.add(duple.clone(), occ.len());
        }
        counts
    }

    /// The `top_n` most frequent duples; equal counts keep first-seen order
    pub fn find_significant_patterns(&self, top_n: usize) -> Vec<(Duple, usize)> {
        self.pattern_counts().most_common(top_n)
    }
}

impl Serialize for DupleReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (duple, occ) in &self.entries {
            map.serialize_entry(&duple.id(), occ)?;
        }
        map.end()
    }
}

/// Scans state sequences for keys that change together
#[derive(Debug, Clone, Copy, Default)]
pub struct DupleAggregator {
    engine: DiffEngine,
}

impl DupleAggregator {
    pub fn new(engine: DiffEngine) -> Self {
        Self { engine }
    }

    /// Count co-changing key pairs across consecutive states
    ///
    /// `states` must be in chronological order. Duples seen fewer than
    /// `min_occurrences` times are dropped.
    pub fn find_duples(&self, states: &[Value], min_occurrences: usize) -> DupleReport {
        let cap = self.engine.options().max_cooccurrence_keys;
        let mut report = DupleReport::default();

        for (i, pair) in states.windows(2).enumerate() {
            let changes = self.engine.diff(&pair[0], &pair[1]);
            if changes.len() < 2 {
                continue;
            }

            let timestamp = occurrence_timestamp(&pair[1], i + 1);
            for duple in changes.duples(cap) {
                let mut pair_changes = BTreeMap::new();
                for key in [duple.first(), duple.second()] {
                    if let Some(change) = changes.get(key) {
                        pair_changes.insert(key.to_string(), change.clone());
                    }
                }
                report.record(
                    duple,
                    DupleOccurrence {
                        timestamp: timestamp.clone(),
                        changes: pair_changes,
                    },
                );
            }
        }

        let seen = report.len();
        report.retain_min(min_occurrences);
        debug!(
            "Found {} duples over {} states ({} below {} occurrences)",
            report.len(),
            states.len(),
            seen - report.len(),
            min_occurrences
        );
        report
    }
}

/// Aggregate with default diff options
pub fn find_duples(states: &[Value], min_occurrences: usize) -> DupleReport {
    DupleAggregator::default().find_duples(states, min_occurrences)
}

pub(crate) fn occurrence_timestamp(state: &Value, index: usize) -> Value {
    state
        .get("_timestamp")
        .or_else(|| state.get("timestamp"))
        .filter(|ts| !ts.is_null())
        .cloned()
        .unwrap_or_else(|| Value::from(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_two_snapshot_scenario() {
        let s1 = json!({"player": {"health": 100, "wetness": 0}});
        let s2 = json!({"player": {"health": 90, "wetness": 20}});

        let report = find_duples(&[s1, s2], 1);

        assert_eq!(report.len(), 1);
        let occ = report
            .get(&Duple::new("player.wetness", "player.health"))
            .unwrap();
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].timestamp, json!(1));
        assert_eq!(
            occ[0].changes["player.health"],
            Change::new(Some(json!(100)), Some(json!(90)))
        );
        assert_eq!(
            occ[0].changes["player.wetness"],
            Change::new(Some(json!(0)), Some(json!(20)))
        );

        // Either id order resolves to the same entry
        assert!(report.get_id("player.health:player.wetness").is_some());
        assert!(report.get_id("player.wetness:player.health").is_some());
    }

    #[test]
    fn test_min_occurrences_filter() {
        let states = vec![
            json!({"_timestamp": 1.0, "p": {"a": 1, "b": 1, "c": 1}}),
            json!({"_timestamp": 2.0, "p": {"a": 2, "b": 2, "c": 1}}),
            json!({"_timestamp": 3.0, "p": {"a": 3, "b": 3, "c": 2}}),
            json!({"_timestamp": 4.0, "p": {"a": 3, "b": 3, "c": 3}}),
        ];

        let all = find_duples(&states, 1);
        assert_eq!(all.len(), 3);

        let frequent = find_duples(&states, 2);
        assert_eq!(frequent.len(), 1);
        let occ = frequent.get(&Duple::new("p.a", "p.b")).unwrap();
        let stamps: Vec<Value> = occ.iter().map(|o| o.timestamp.clone()).collect();
        assert_eq!(stamps, vec![json!(2.0), json!(3.0)]);
    }

    #[test]
    fn test_metadata_keys_ignored() {
        let states = vec![
            json!({"_timestamp": 1.0, "_frame": 1, "p": {"a": 1}}),
            json!({"_timestamp": 2.0, "_frame": 2, "p": {"a": 2}}),
        ];
        assert!(find_duples(&states, 1).is_empty());
    }

    #[test]
    fn test_significant_patterns_ranked() {
        let states = vec![
            json!({"x": 0, "y": 0, "z": 0}),
            json!({"x": 1, "y": 1, "z": 0}),
            json!({"x": 2, "y": 1, "z": 1}),
            json!({"x": 3, "y": 1, "z": 2}),
        ];

        let report = find_duples(&states, 1);
        let top = report.find_significant_patterns(2);

        assert_eq!(top[0], (Duple::new("x", "z"), 2));
        assert_eq!(top[1], (Duple::new("x", "y"), 1));
        assert_eq!(report.pattern_counts().total(), 3);
    }

    #[test]
    fn test_short_sequences() {
        assert!(find_duples(&[], 1).is_empty());
        assert!(find_duples(&[json!({"a": 1})], 1).is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let report = find_duples(&[json!({"a": 1, "b": 1}), json!({"a": 2, "b": 2})], 1);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["a:b"][0]["timestamp"], json!(1));
        assert_eq!(value["a:b"][0]["a"]["old"], json!(1));
        assert_eq!(value["a:b"][0]["b"]["new"], json!(2));
    }
}
