//! Delete.
//!
//! Removing a leaf promotes its sibling: the grandparent's child pointer is
//! swung from the parent to a fresh structural copy of the sibling, and
//! parent, leaf and sibling are all marked as removed. The copy (rather
//! than the sibling itself) is what keeps version chains intact: the copy
//! supersedes the parent and carries the deleting operation's sequence
//! number, so older scans still reach the parent through `prev`.

use std::ptr;
use std::sync::Arc;

use crate::alloc::{free_unpublished_descriptor, free_unpublished_node};
use crate::descriptor::{Descriptor, UpdateState};
use crate::node::Node;
use crate::tracing_helpers::debug_log;

use super::search::ResumePoint;
use super::SnapTree;

impl<K: Ord + Clone, V> SnapTree<K, V> {
    /// Removes `key`, returning the value it mapped to, or `None` when the
    /// key was absent.
    ///
    /// The successful publish-and-commit is the linearization point; an
    /// absent-key return linearizes at the validation that certified the
    /// leaf.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let _guard = self.collector.enter();
        let mut resume = ResumePoint::new();

        loop {
            let seq = self.counter();
            let Some(path) = self.locate_leaf(key, seq, &mut resume) else {
                continue;
            };
            let Some(witness) = self.validate_leaf(path.gp, path.p, path.l, key) else {
                continue;
            };

            // SAFETY: path nodes are retained while the tree is alive.
            unsafe {
                let l_ref = &*path.l;
                if !l_ref.key_equals(key) {
                    return None;
                }
                let p_ref = &*path.p;

                // The sibling sits on the opposite side of the leaf.
                let sibling_left = !p_ref.routes_left(key);
                let sibling = p_ref.read_child(sibling_left, seq);
                if self.validate_link(p_ref, sibling, sibling_left).is_none() {
                    continue;
                }

                if self.counter() != seq {
                    continue;
                }

                // Structural copy of the sibling; it supersedes `p` in
                // version time.
                let s_ref = &*sibling;
                let new_sibling = Box::into_raw(Box::new(if s_ref.is_leaf() {
                    Node::leaf(
                        s_ref.key().cloned(),
                        s_ref.value().cloned(),
                        path.p,
                        s_ref.load_info(),
                        seq,
                    )
                } else {
                    Node::internal(
                        s_ref.key().cloned(),
                        s_ref.load_child(true),
                        s_ref.load_child(false),
                        path.p,
                        s_ref.load_info(),
                        seq,
                    )
                }));

                // An internal sibling's promoted children must still be its
                // children; a leaf sibling needs no further certification.
                let sinfo = if s_ref.is_leaf() {
                    s_ref.load_info()
                } else {
                    let ns = &*new_sibling;
                    let Some(sinfo) = self.validate_link(s_ref, ns.load_child(true), true)
                    else {
                        free_unpublished_node(new_sibling);
                        continue;
                    };
                    if self
                        .validate_link(s_ref, ns.load_child(false), false)
                        .is_none()
                    {
                        free_unpublished_node(new_sibling);
                        continue;
                    }
                    sinfo
                };

                let prior = l_ref.value().cloned();
                if self.execute_delete(
                    path.gp,
                    path.p,
                    path.l,
                    sibling,
                    witness.gpinfo,
                    witness.pinfo,
                    l_ref.load_info(),
                    sinfo,
                    new_sibling,
                    seq,
                ) {
                    return prior;
                }
            }
        }
    }

    /// Re-checks frozenness and the counter, publishes the three-victim
    /// delete descriptor on `gp`, and helps it to completion.
    #[allow(clippy::too_many_arguments)]
    fn execute_delete(
        &self,
        gp: *mut Node<K, V>,
        p: *mut Node<K, V>,
        l: *mut Node<K, V>,
        s: *mut Node<K, V>,
        gpinfo: *mut Descriptor<K, V>,
        pinfo: *mut Descriptor<K, V>,
        linfo: *mut Descriptor<K, V>,
        sinfo: *mut Descriptor<K, V>,
        new_sibling: *mut Node<K, V>,
        seq: u64,
    ) -> bool {
        // Only sentinel-keyed leaves can sit directly under the root, and
        // those are never deleted, so `gp` is always a real node here.
        debug_assert!(!gp.is_null());

        // SAFETY: nodes and descriptors are retained while the tree is
        // alive; `new_sibling` is private until the publish CAS succeeds.
        unsafe {
            for (node, info) in [(gp, gpinfo), (p, pinfo), (l, linfo), (s, sinfo)] {
                if (*node).frozen_for(&*info) {
                    if matches!((*info).state(), UpdateState::Null | UpdateState::Try) {
                        self.help(info);
                    }
                    free_unpublished_node(new_sibling);
                    return false;
                }
            }
            if self.counter() != seq {
                free_unpublished_node(new_sibling);
                return false;
            }

            let descriptor = Box::into_raw(Box::new(Descriptor::for_delete(
                gp,
                p,
                pinfo,
                l,
                linfo,
                s,
                sinfo,
                new_sibling,
                seq,
            )));

            let gp_ref = &*gp;
            if ptr::eq(gp_ref.load_info(), gpinfo) && gp_ref.cas_info(gpinfo, descriptor) {
                debug_log!(seq, "delete descriptor published");
                self.registry.register_nodes(&[new_sibling]);
                self.registry.register_descriptor(descriptor);
                self.help(descriptor)
            } else {
                free_unpublished_descriptor(descriptor);
                free_unpublished_node(new_sibling);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::SnapTree;

    #[test]
    fn remove_missing_key_leaves_the_tree_unchanged() {
        let tree: SnapTree<i64, u64> = SnapTree::new();
        assert!(tree.remove(&42).is_none());

        assert!(tree.put_if_absent(1, 10).is_none());
        assert!(tree.remove(&42).is_none());
        assert!(tree.contains(&1));
        tree.check_invariants();
    }

    #[test]
    fn remove_returns_the_prior_value() {
        let tree: SnapTree<i64, &str> = SnapTree::new();
        for (k, v) in [(10, "ten"), (20, "twenty"), (30, "thirty")] {
            assert!(tree.put_if_absent(k, v).is_none());
        }
        assert_eq!(*tree.remove(&20).unwrap(), "twenty");
        assert!(!tree.contains(&20));
        assert!(tree.remove(&20).is_none());
        assert!(tree.contains(&10));
        assert!(tree.contains(&30));
        tree.check_invariants();
    }

    #[test]
    fn remove_promotes_internal_siblings() {
        let tree: SnapTree<i64, u64> = SnapTree::new();
        // Build a shape where the removed leaf's sibling is internal.
        for k in [50, 25, 75, 60, 90] {
            assert!(tree.put_if_absent(k, k as u64).is_none());
        }
        // 25's sibling subtree contains {50, 60, 75, 90}.
        assert_eq!(*tree.remove(&25).unwrap(), 25);
        for k in [50, 60, 75, 90] {
            assert!(tree.contains(&k), "lost {k} promoting its subtree");
        }
        tree.check_invariants();
    }

    #[test]
    fn drain_and_refill() {
        let tree: SnapTree<i64, u64> = SnapTree::new();
        for round in 0..3 {
            for k in 0..30 {
                assert!(tree.put_if_absent(k, round * 100 + k as u64).is_none());
            }
            for k in 0..30 {
                assert_eq!(*tree.remove(&k).unwrap(), round * 100 + k as u64);
            }
            for k in 0..30 {
                assert!(!tree.contains(&k));
            }
            tree.check_invariants();
        }
    }
}
