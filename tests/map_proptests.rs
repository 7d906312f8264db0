//! Property-based tests.
//!
//! Differential testing against `BTreeMap` as the oracle: any sequence of
//! operations applied to both must report the same results and leave the
//! same contents, and every scan must match the oracle's range view.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

mod common;

use std::collections::BTreeMap;

use proptest::prelude::*;
use snaptree::SnapTree;

/// Operations for random sequences. Keys are drawn from a small domain so
/// sequences revisit keys often.
#[derive(Debug, Clone)]
enum Op {
    Put(i64, u64),
    Remove(i64),
    Contains(i64),
    Get(i64),
    Scan(i64, i64),
}

fn small_key() -> impl Strategy<Value = i64> {
    0..48i64
}

fn operations(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            3 => (small_key(), any::<u64>()).prop_map(|(k, v)| Op::Put(k, v)),
            2 => small_key().prop_map(Op::Remove),
            1 => small_key().prop_map(Op::Contains),
            1 => small_key().prop_map(Op::Get),
            1 => (small_key(), small_key()).prop_map(|(a, b)| {
                Op::Scan(a.min(b), a.max(b))
            }),
        ],
        0..=max_ops,
    )
}

fn oracle_scan(oracle: &BTreeMap<i64, u64>, low: i64, high: i64) -> Vec<u64> {
    oracle.range(low..=high).map(|(_, v)| *v).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Any operation sequence matches the oracle step by step.
    #[test]
    fn matches_btreemap_oracle(ops in operations(120)) {
        common::init_tracing();
        let tree: SnapTree<i64, u64> = SnapTree::new();
        let mut oracle: BTreeMap<i64, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    let expected = oracle.get(&k).copied();
                    let actual = tree.put_if_absent(k, v).map(|a| *a);
                    prop_assert_eq!(actual, expected, "put_if_absent({}, {})", k, v);
                    oracle.entry(k).or_insert(v);
                }
                Op::Remove(k) => {
                    let expected = oracle.remove(&k);
                    let actual = tree.remove(&k).map(|a| *a);
                    prop_assert_eq!(actual, expected, "remove({})", k);
                }
                Op::Contains(k) => {
                    prop_assert_eq!(tree.contains(&k), oracle.contains_key(&k));
                }
                Op::Get(k) => {
                    prop_assert_eq!(tree.get(&k).map(|a| *a), oracle.get(&k).copied());
                }
                Op::Scan(low, high) => {
                    let actual: Vec<u64> =
                        tree.range_scan(&low, &high).iter().map(|v| **v).collect();
                    prop_assert_eq!(actual, oracle_scan(&oracle, low, high));
                }
            }
        }

        tree.check_invariants();

        // Final sweep: full contents agree.
        let all: Vec<u64> = tree
            .range_scan(&i64::MIN, &i64::MAX)
            .iter()
            .map(|v| **v)
            .collect();
        prop_assert_eq!(all, oracle.values().copied().collect::<Vec<_>>());
    }

    /// Inserted keys are always retrievable with their value.
    #[test]
    fn insert_then_get(keys in prop::collection::hash_set(any::<i64>(), 1..64)) {
        let tree: SnapTree<i64, i64> = SnapTree::new();
        for &k in &keys {
            prop_assert!(tree.put_if_absent(k, k.wrapping_mul(3)).is_none());
        }
        for &k in &keys {
            prop_assert_eq!(*tree.get(&k).unwrap(), k.wrapping_mul(3));
        }
        tree.check_invariants();
    }

    /// A full-range scan returns every value in ascending key order.
    #[test]
    fn full_scan_is_sorted(keys in prop::collection::hash_set(-1000..1000i64, 0..128)) {
        let tree: SnapTree<i64, i64> = SnapTree::new();
        for &k in &keys {
            tree.put_if_absent(k, k);
        }
        let mut expected: Vec<i64> = keys.iter().copied().collect();
        expected.sort_unstable();

        let scanned: Vec<i64> = tree
            .range_scan(&-1000, &1000)
            .iter()
            .map(|v| **v)
            .collect();
        prop_assert_eq!(scanned, expected);
    }

    /// Removing everything empties the map regardless of order.
    #[test]
    fn remove_all_empties_the_map(mut keys in prop::collection::vec(0..64i64, 1..64)) {
        let tree: SnapTree<i64, i64> = SnapTree::new();
        for &k in &keys {
            tree.put_if_absent(k, k);
        }
        keys.reverse();
        for &k in &keys {
            tree.remove(&k);
        }
        prop_assert!(tree.range_scan(&0, &64).is_empty());
        for &k in &keys {
            prop_assert!(!tree.contains(&k));
        }
        tree.check_invariants();
    }
}
