//! Leaf search.
//!
//! Locates the leaf a key would occupy together with its parent and
//! grandparent. Retries resume from the previous attempt's
//! great-grandparent instead of the root when that node is still usable,
//! which keeps contended retries from repeatedly paying the full descent.

use std::ptr;
use std::sync::Arc;

use crate::node::Node;

use super::SnapTree;

/// Carry-over between search attempts of one operation: the
/// great-grandparent observed by the previous descent, if any.
pub(crate) struct ResumePoint<K, V> {
    ggp: *mut Node<K, V>,
}

impl<K, V> ResumePoint<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            ggp: ptr::null_mut(),
        }
    }
}

/// A located leaf with the two ancestors the validation needs.
pub(crate) struct SearchPath<K, V> {
    /// Grandparent of `l`; null only when `p` is the root.
    pub(crate) gp: *mut Node<K, V>,
    /// Parent of `l`.
    pub(crate) p: *mut Node<K, V>,
    /// The candidate leaf.
    pub(crate) l: *mut Node<K, V>,
}

impl<K: Ord, V> SnapTree<K, V> {
    /// One search attempt for `key` under sequence view `seq`.
    ///
    /// Returns `None` when a resumed descent turned out incoherent (the
    /// resume node was detached before the descent ran) and the caller must
    /// retry from the root.
    pub(crate) fn locate_leaf(
        &self,
        key: &K,
        seq: u64,
        resume: &mut ResumePoint<K, V>,
    ) -> Option<SearchPath<K, V>> {
        let root = self.root();

        // SAFETY: nodes and descriptors are retained while the tree is
        // alive; `read_child` preconditions hold because every starting
        // point carries a stamp at most `seq`.
        unsafe {
            let mut p: *mut Node<K, V>;
            let mut l: *mut Node<K, V>;

            let start = resume.ggp;
            if !start.is_null() && !(*start).frozen_for(&*(*start).load_info()) {
                p = start;
                l = (*p).read_child((*p).routes_left(key), seq);
            } else {
                p = root;
                // Even the first step is a versioned read: the root's left
                // child may already carry a stamp newer than `seq`.
                l = (*root).read_child(true, seq);
            }

            let mut ggp: *mut Node<K, V> = ptr::null_mut();
            let mut gp: *mut Node<K, V> = ptr::null_mut();
            while !(*l).is_leaf() {
                ggp = gp;
                gp = p;
                p = l;
                l = (*p).read_child((*p).routes_left(key), seq);
            }
            resume.ggp = ggp;

            // A resumed start may have been detached before the descent:
            // then the loop never ran, `gp` is null, and `p` is the stale
            // resume node rather than the root. Restart from the root.
            if gp.is_null() && !ptr::eq(p, root) {
                return None;
            }

            Some(SearchPath { gp, p, l })
        }
    }

    /// Searches until a leaf passes validation, and returns it.
    ///
    /// The successful validation's second `info` re-read is the
    /// linearization point of the lookup built on top of this.
    fn locate_validated(&self, key: &K) -> *mut Node<K, V> {
        let mut resume = ResumePoint::new();
        loop {
            let seq = self.counter();
            let Some(path) = self.locate_leaf(key, seq, &mut resume) else {
                continue;
            };
            if self
                .validate_leaf(path.gp, path.p, path.l, key)
                .is_some()
            {
                return path.l;
            }
        }
    }

    /// Returns true when the map contains `key`.
    pub fn contains(&self, key: &K) -> bool {
        let _guard = self.collector.enter();
        let l = self.locate_validated(key);
        // SAFETY: leaves are retained while the tree is alive.
        unsafe { (*l).key_equals(key) }
    }

    /// Returns the value mapped to `key`, if any.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let _guard = self.collector.enter();
        let l = self.locate_validated(key);
        // SAFETY: leaves are retained while the tree is alive.
        unsafe {
            let l = &*l;
            if l.key_equals(key) {
                l.value().cloned()
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::SnapTree;

    #[test]
    fn empty_tree_search_lands_on_a_sentinel_leaf() {
        let tree: SnapTree<i64, u64> = SnapTree::new();
        assert!(!tree.contains(&1));
        assert!(tree.get(&1).is_none());
    }

    #[test]
    fn search_finds_inserted_keys_among_neighbors() {
        let tree: SnapTree<i64, u64> = SnapTree::new();
        for k in [50, 25, 75, 10, 60, 90] {
            assert!(tree.put_if_absent(k, k as u64).is_none());
        }
        for k in [50, 25, 75, 10, 60, 90] {
            assert!(tree.contains(&k));
            assert_eq!(*tree.get(&k).unwrap(), k as u64);
        }
        for missing in [0, 26, 49, 51, 89, 100] {
            assert!(!tree.contains(&missing));
        }
    }
}
