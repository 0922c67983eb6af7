//! Property-based tests for the structural diff and pattern counting.
//!
//! - Diff is symmetric: same paths, old/new swapped
//! - Diff of a value with itself is empty
//! - Duples are unordered
//! - Pair generation yields C(n, 2) duples
//! - The comparator on single-element sequences is exactly one diff

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use serde_json::{Map, Value};
use statelog_engine::analysis::{compare_sequences, diff, Duple, PatternCount};

/// Arbitrary nested JSON objects; keys never contain the path separator
fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("_?[a-e]{1,3}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn arb_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("_?[a-e]{1,3}", arb_value(), 0..6)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>()))
}

proptest! {
    /// Property: diff(b, a) is diff(a, b) with every change reversed.
    #[test]
    fn prop_diff_is_symmetric(a in arb_object(), b in arb_object()) {
        let forward = diff(&a, &b);
        let backward = diff(&b, &a);

        prop_assert_eq!(
            forward.keys().collect::<Vec<_>>(),
            backward.keys().collect::<Vec<_>>()
        );
        prop_assert_eq!(&backward.changes, &forward.reversed().changes);
        prop_assert_eq!(backward.metadata_changed, forward.metadata_changed);
    }

    /// Property: a value never differs from itself.
    #[test]
    fn prop_diff_is_reflexive(a in arb_value()) {
        let set = diff(&a, &a);
        prop_assert!(set.is_identical());
    }

    /// Property: change paths never name metadata keys.
    #[test]
    fn prop_metadata_keys_never_reported(a in arb_object(), b in arb_object()) {
        for path in diff(&a, &b).keys() {
            prop_assert!(path.split('.').all(|part| !part.starts_with('_')));
        }
    }

    /// Property: (k1, k2) and (k2, k1) are the same duple and count together.
    #[test]
    fn prop_duples_are_unordered(k1 in "[a-z.]{1,12}", k2 in "[a-z.]{1,12}") {
        let forward = Duple::new(k1.as_str(), k2.as_str());
        let backward = Duple::new(k2.as_str(), k1.as_str());
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(forward.id(), backward.id());

        let counts: PatternCount = vec![forward.clone(), backward].into_iter().collect();
        prop_assert_eq!(counts.len(), 1);
        prop_assert_eq!(counts.get(&forward), 2);
    }

    /// Property: n changed paths give n * (n - 1) / 2 distinct duples.
    #[test]
    fn prop_pair_generation_is_complete(a in arb_object(), b in arb_object()) {
        let set = diff(&a, &b);
        let n = set.len();
        let duples = set.duples(None);

        prop_assert_eq!(duples.len(), n * n.saturating_sub(1) / 2);
        let distinct: PatternCount = duples.into_iter().collect();
        prop_assert_eq!(distinct.len(), n * n.saturating_sub(1) / 2);
    }

    /// Property: single-element sequences reduce to one diff.
    #[test]
    fn prop_comparator_base_case(a in arb_object(), b in arb_object()) {
        let result = compare_sequences(&[a.clone()], &[b.clone()]);

        prop_assert_eq!(result.comparisons, 1);
        prop_assert_eq!(result.all_changesets.len(), 1);
        prop_assert_eq!(result.central_patterns, Some(diff(&a, &b)));
    }
}
