//! Structural self-checks.
//!
//! [`SnapTree::check_invariants`] walks the current tree and panics on the
//! first violation it finds. The test suite calls it at quiescence after
//! every interesting workload; it is not meant to run concurrently with
//! updates (a busy descriptor on a reachable node is reported as a
//! violation, which is exactly right for a quiescent tree).

use crate::descriptor::UpdateState;
use crate::node::Node;

use super::SnapTree;

impl<K: Ord, V> SnapTree<K, V> {
    /// Checks every structural invariant of the current tree. Panics with
    /// a description on the first violation.
    ///
    /// Call only while no operation is in flight.
    pub fn check_invariants(&self) {
        let counter = self.counter();
        // SAFETY: &self keeps the tree alive; at quiescence the current
        // tree is stable.
        unsafe {
            self.check_subtree(self.root(), None, None, false, counter);
        }
    }

    /// Recursive checker.
    ///
    /// `low`/`high` bound the real keys permitted in this subtree
    /// (inclusive / exclusive); `sentinel_only` marks subtrees that may
    /// contain nothing but sentinel nodes (the right side of a
    /// sentinel-keyed router).
    unsafe fn check_subtree(
        &self,
        node: *mut Node<K, V>,
        low: Option<&K>,
        high: Option<&K>,
        sentinel_only: bool,
        counter: u64,
    ) {
        let n = unsafe { &*node };

        assert!(
            n.version_seq() <= counter,
            "node stamped after the current counter"
        );

        // Version chains decrease strictly toward older versions.
        let mut newer = n.version_seq();
        let mut prev = n.prev();
        while !prev.is_null() {
            let prev_ref = unsafe { &*prev };
            assert!(
                prev_ref.version_seq() < newer,
                "version chain is not strictly decreasing"
            );
            newer = prev_ref.version_seq();
            prev = prev_ref.prev();
        }

        // Descriptor closure: reachable nodes are quiet and not removed.
        let info = unsafe { &*n.load_info() };
        match info.state() {
            UpdateState::Null | UpdateState::Try => {
                panic!("busy descriptor on a reachable node of a quiescent tree")
            }
            UpdateState::Commit => assert!(
                !info.is_marked(n),
                "logically removed node still reachable"
            ),
            UpdateState::Abort => {}
        }

        if sentinel_only {
            assert!(n.key().is_none(), "real key in a sentinel-only subtree");
        }

        if n.is_leaf() {
            assert!(
                n.load_child(false).is_null(),
                "half-leaf: null left child but non-null right"
            );
            match n.key() {
                Some(k) => {
                    assert!(n.value().is_some(), "keyed leaf without a value");
                    if let Some(lo) = low {
                        assert!(lo <= k, "leaf key below its subtree bound");
                    }
                    if let Some(hi) = high {
                        assert!(k < hi, "leaf key at or above its subtree bound");
                    }
                }
                None => {
                    assert!(n.value().is_none(), "sentinel leaf carrying a value");
                    assert!(
                        high.is_none(),
                        "sentinel leaf inside a key-bounded subtree"
                    );
                }
            }
            return;
        }

        assert!(
            !n.load_child(false).is_null(),
            "half-leaf: non-null left child but null right"
        );
        assert!(n.value().is_none(), "internal node carrying a value");

        let left = n.load_child(true);
        let right = n.load_child(false);
        unsafe {
            match n.key() {
                Some(k) => {
                    // Left subtree strictly below the routing key, right at
                    // or above it.
                    self.check_subtree(left, low, Some(k), sentinel_only, counter);
                    self.check_subtree(right, Some(k), high, sentinel_only, counter);
                }
                None => {
                    // Sentinel router: every search goes left; the right
                    // side holds only sentinels.
                    self.check_subtree(left, low, high, sentinel_only, counter);
                    self.check_subtree(right, low, high, true, counter);
                }
            }
        }
    }
}
