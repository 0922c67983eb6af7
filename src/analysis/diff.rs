// src/analysis/diff.rs
//! Structural diff engine
//!
//! Walks two nested values in parallel and reports every leaf key path whose
//! value differs:
//!
//! ```text
//! {player: {health: 100, wetness: 0}}      player.health  : 100 → 90
//! {player: {health: 90,  wetness: 20}}  →  player.wetness :   0 → 20
//! ```
//!
//! - Maps on both sides recurse; key paths are dot-joined.
//! - Arrays are compared whole; a differing array is one opaque change.
//! - A map against a non-map is one change at that path.
//! - A key missing on one side reports `None` on that side (maps are
//!   expanded to their leaves; a map holding only metadata is reported
//!   whole).
//! - Keys starting with `_` are metadata: never reported as paths, but a
//!   difference sets [`ChangeSet::metadata_changed`].
//!
//! Numbers compare exactly unless `float_tolerance` is set, so decaying
//! float state shows up as a change on every tick.

use crate::analysis::duple::Duple;
use crate::recording::event::Value;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::warn;

/// Path reported when two non-map roots differ
pub const ROOT_PATH: &str = "$";

/// Marker for metadata keys
pub const METADATA_PREFIX: char = '_';

/// Default bound on keys used for pair generation
pub const DEFAULT_MAX_COOCCURRENCE_KEYS: usize = 512;

/// Diff behaviour switches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Numbers within this distance are equal (`0.0` = exact)
    pub float_tolerance: f64,

    /// Cap on changed keys fed into pair generation (`None` = unbounded)
    pub max_cooccurrence_keys: Option<usize>,

    /// Compute `time_difference` from top-level `timestamp` (or `_timestamp`)
    /// fields
    pub temporal_mode: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            float_tolerance: 0.0,
            max_cooccurrence_keys: Some(DEFAULT_MAX_COOCCURRENCE_KEYS),
            temporal_mode: false,
        }
    }
}

/// Old and new value at one key path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// `None` when the path is absent on the left
    pub old: Option<Value>,

    /// `None` when the path is absent on the right
    pub new: Option<Value>,
}

impl Change {
    pub fn new(old: Option<Value>, new: Option<Value>) -> Self {
        Self { old, new }
    }

    /// Same change seen from the other side
    pub fn reversed(&self) -> Self {
        Self {
            old: self.new.clone(),
            new: self.old.clone(),
        }
    }

    /// Numeric delta when both sides are numbers
    pub fn delta(&self) -> Option<f64> {
        let old = self.old.as_ref()?.as_f64()?;
        let new = self.new.as_ref()?.as_f64()?;
        Some(new - old)
    }
}

/// Distance between the `timestamp` fields of two compared structures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TimeDifference {
    /// Absolute numeric difference
    Seconds(f64),

    /// Size of the symmetric difference of the two strings' character sets.
    /// A rough heuristic, not a duration.
    CharacterDistance(usize),
}

/// Output of one diff
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Changed leaf paths in path order
    pub changes: BTreeMap<String, Change>,

    /// Some `_`-prefixed key differed
    #[serde(default)]
    pub metadata_changed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_difference: Option<TimeDifference>,
}

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// No data path changed (metadata may still differ)
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The two inputs were equal, metadata included
    pub fn is_identical(&self) -> bool {
        self.changes.is_empty() && !self.metadata_changed
    }

    pub fn get(&self, path: &str) -> Option<&Change> {
        self.changes.get(path)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn reversed(&self) -> Self {
        Self {
            changes: self
                .changes
                .iter()
                .map(|(k, c)| (k.clone(), c.reversed()))
                .collect(),
            metadata_changed: self.metadata_changed,
            time_difference: self.time_difference,
        }
    }

    /// All unordered pairs of changed paths
    ///
    /// Quadratic in the number of changed paths; with `cap` set only the
    /// first `cap` paths take part.
    pub fn duples(&self, cap: Option<usize>) -> Vec<Duple> {
        let total = self.changes.len();
        let limit = cap.unwrap_or(total).min(total);
        if limit < total {
            warn!(
                "Co-occurrence limited to {} of {} changed keys",
                limit, total
            );
        }

        let keys: Vec<&String> = self.changes.keys().take(limit).collect();
        let mut pairs = Vec::with_capacity(limit * limit.saturating_sub(1) / 2);
        for (i, first) in keys.iter().enumerate() {
            for second in &keys[i + 1..] {
                pairs.push(Duple::new(first.as_str(), second.as_str()));
            }
        }
        pairs
    }
}

/// Recursive diff over [`Value`] trees
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine {
    options: DiffOptions,
}

impl DiffEngine {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Diff `a` against `b`
    pub fn diff(&self, a: &Value, b: &Value) -> ChangeSet {
        let mut set = ChangeSet::default();

        match (a, b) {
            (Value::Object(left), Value::Object(right)) => {
                self.walk(&mut set, "", Some(left), Some(right));
                if self.options.temporal_mode {
                    set.time_difference =
                        time_difference(timestamp_field(left), timestamp_field(right));
                }
            }
            _ => {
                if !self.values_equal(a, b) {
                    set.changes.insert(
                        ROOT_PATH.to_string(),
                        Change::new(Some(a.clone()), Some(b.clone())),
                    );
                }
            }
        }

        set
    }

    fn walk(
        &self,
        set: &mut ChangeSet,
        prefix: &str,
        left: Option<&Map<String, Value>>,
        right: Option<&Map<String, Value>>,
    ) {
        let keys: BTreeSet<&String> = left
            .into_iter()
            .flat_map(|m| m.keys())
            .chain(right.into_iter().flat_map(|m| m.keys()))
            .collect();

        for key in keys {
            let a = left.and_then(|m| m.get(key));
            let b = right.and_then(|m| m.get(key));

            if key.starts_with(METADATA_PREFIX) {
                if !self.options_equal(a, b) {
                    set.metadata_changed = true;
                }
                continue;
            }

            let path = join_path(prefix, key);
            match (a, b) {
                (Some(Value::Object(x)), Some(Value::Object(y))) => {
                    self.walk(set, &path, Some(x), Some(y));
                }
                (Some(Value::Object(x)), None) if !x.is_empty() => {
                    let before = set.changes.len();
                    self.walk(set, &path, Some(x), None);
                    if set.changes.len() == before {
                        // Only metadata below: the map itself disappeared
                        set.changes.insert(path, Change::new(a.cloned(), None));
                    }
                }
                (None, Some(Value::Object(y))) if !y.is_empty() => {
                    let before = set.changes.len();
                    self.walk(set, &path, None, Some(y));
                    if set.changes.len() == before {
                        set.changes.insert(path, Change::new(None, b.cloned()));
                    }
                }
                (Some(x), Some(y)) => {
                    if !self.values_equal(x, y) {
                        set.changes
                            .insert(path, Change::new(Some(x.clone()), Some(y.clone())));
                    }
                }
                (a, b) => {
                    set.changes.insert(path, Change::new(a.cloned(), b.cloned()));
                }
            }
        }
    }

    fn options_equal(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        match (a, b) {
            (Some(x), Some(y)) => self.values_equal(x, y),
            (None, None) => true,
            _ => false,
        }
    }

    /// Deep equality honouring `float_tolerance`
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                    return x == y;
                }
                if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                    return x == y;
                }
                match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => {
                        let tolerance = self.options.float_tolerance;
                        if tolerance > 0.0 {
                            (x - y).abs() <= tolerance
                        } else {
                            x == y
                        }
                    }
                    _ => false,
                }
            }
            (Value::Array(x), Value::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(a, b)| self.values_equal(a, b))
            }
            (Value::Object(x), Value::Object(y)) => {
                x.len() == y.len()
                    && x.iter()
                        .all(|(k, a)| y.get(k).map(|b| self.values_equal(a, b)).unwrap_or(false))
            }
            _ => a == b,
        }
    }
}

/// Diff with default options
pub fn diff(a: &Value, b: &Value) -> ChangeSet {
    DiffEngine::default().diff(a, b)
}

/// Resolve a dot-delimited path (`"$"` is the root)
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path == ROOT_PATH {
        return Some(value);
    }
    path.split('.')
        .try_fold(value, |current, part| current.as_object()?.get(part))
}

/// Every leaf path of a value, metadata keys excluded
pub fn leaf_paths(value: &Value) -> Vec<String> {
    fn collect(prefix: &str, map: &Map<String, Value>, out: &mut Vec<String>) {
        for (key, value) in map {
            if key.starts_with(METADATA_PREFIX) {
                continue;
            }
            let path = join_path(prefix, key);
            let before = out.len();
            if let Value::Object(inner) = value {
                collect(&path, inner, out);
            }
            if out.len() == before {
                out.push(path);
            }
        }
    }

    let mut out = Vec::new();
    if let Value::Object(map) = value {
        collect("", map, &mut out);
    }
    out
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Top-level `timestamp`, else the `_timestamp` of a snapshot state view
fn timestamp_field(map: &Map<String, Value>) -> Option<&Value> {
    map.get("timestamp").or_else(|| map.get("_timestamp"))
}

fn time_difference(a: Option<&Value>, b: Option<&Value>) -> Option<TimeDifference> {
    let (a, b) = (a?, b?);

    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return Some(TimeDifference::Seconds((x - y).abs()));
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            let x: HashSet<char> = x.chars().collect();
            let y: HashSet<char> = y.chars().collect();
            Some(TimeDifference::CharacterDistance(
                x.symmetric_difference(&y).count(),
            ))
        }
        _ => None,
    }
}
