// src/analysis/duple.rs
//! Duples (unordered pairs of key paths) and their occurrence counts

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Separator used in the canonical duple id
pub const DUPLE_SEPARATOR: char = ':';

/// Unordered pair of key paths
///
/// Stored in canonical (lexicographic) order, so `(a, b)` and `(b, a)` are
/// the same duple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Duple {
    first: String,
    second: String,
}

impl Duple {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    /// Canonical `"<first>:<second>"` id
    pub fn id(&self) -> String {
        format!("{}{}{}", self.first, DUPLE_SEPARATOR, self.second)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.first == path || self.second == path
    }
}

impl fmt::Display for Duple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.first, DUPLE_SEPARATOR, self.second)
    }
}

impl Serialize for Duple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id())
    }
}

/// Occurrence counts per duple, remembering first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternCount {
    counts: HashMap<Duple, usize>,
    order: Vec<Duple>,
}

impl PatternCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, duple: Duple) {
        self.add(duple, 1);
    }

    pub fn add(&mut self, duple: Duple, count: usize) {
        if count == 0 {
            return;
        }
        match self.counts.get_mut(&duple) {
            Some(existing) => *existing += count,
            None => {
                self.order.push(duple.clone());
                self.counts.insert(duple, count);
            }
        }
    }

    /// Sum another count into this one, appending unseen duples in its order
    pub fn merge(&mut self, other: &PatternCount) {
        for (duple, count) in other.iter() {
            self.add(duple.clone(), count);
        }
    }

    pub fn get(&self, duple: &Duple) -> usize {
        self.counts.get(duple).copied().unwrap_or(0)
    }

    /// Distinct duples
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Duples with their counts in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&Duple, usize)> {
        self.order
            .iter()
            .map(move |d| (d, self.counts.get(d).copied().unwrap_or(0)))
    }

    /// The `n` most frequent duples; ties keep first-seen order
    pub fn most_common(&self, n: usize) -> Vec<(Duple, usize)> {
        let mut ranked: Vec<(Duple, usize)> =
            self.iter().map(|(d, c)| (d.clone(), c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

impl FromIterator<Duple> for PatternCount {
    fn from_iter<I: IntoIterator<Item = Duple>>(iter: I) -> Self {
        let mut counts = PatternCount::new();
        for duple in iter {
            counts.increment(duple);
        }
        counts
    }
}

impl Serialize for PatternCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (duple, count) in self.iter() {
            map.serialize_entry(&duple.id(), &count)?;
        }
        map.end()
    }
}
