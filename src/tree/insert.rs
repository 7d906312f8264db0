//! Insert.

use std::ptr;
use std::sync::Arc;

use crate::alloc::{free_unpublished_descriptor, free_unpublished_node};
use crate::descriptor::{Descriptor, UpdateState};
use crate::node::Node;
use crate::tracing_helpers::debug_log;

use super::search::ResumePoint;
use super::SnapTree;

impl<K: Ord + Clone, V> SnapTree<K, V> {
    /// Maps `key` to `value` unless the key is already present.
    ///
    /// Returns the existing value when the key is present (the map is
    /// unchanged) or `None` when this call inserted the mapping.
    ///
    /// The successful publish-and-commit is the linearization point; a
    /// present-key return linearizes at the validation that certified the
    /// leaf.
    pub fn put_if_absent(&self, key: K, value: V) -> Option<Arc<V>> {
        let _guard = self.collector.enter();
        let value = Arc::new(value);
        let mut resume = ResumePoint::new();

        loop {
            let seq = self.counter();
            let Some(path) = self.locate_leaf(&key, seq, &mut resume) else {
                continue;
            };
            let Some(witness) = self.validate_leaf(path.gp, path.p, path.l, &key) else {
                continue;
            };

            // SAFETY: path nodes are retained while the tree is alive.
            let l = unsafe { &*path.l };
            if l.key_equals(&key) {
                return l.value().cloned();
            }

            // Handshaking: a scan may have begun since `seq` was read; the
            // new nodes must carry a fresh sequence number.
            if self.counter() != seq {
                continue;
            }

            // Replacement triad: the new leaf, a copy of the displaced
            // leaf, and an internal router over both. The router supersedes
            // `l` in version time.
            let new_leaf = Box::into_raw(Box::new(Node::leaf(
                Some(key.clone()),
                Some(Arc::clone(&value)),
                ptr::null_mut(),
                self.dummy(),
                seq,
            )));
            let new_sibling = Box::into_raw(Box::new(Node::leaf(
                l.key().cloned(),
                l.value().cloned(),
                ptr::null_mut(),
                self.dummy(),
                seq,
            )));
            let new_internal = if l.routes_left(&key) {
                // New key is the smaller (or `l` is a sentinel): it goes
                // left under the displaced leaf's key.
                Node::internal(
                    l.key().cloned(),
                    new_leaf,
                    new_sibling,
                    path.l,
                    self.dummy(),
                    seq,
                )
            } else {
                Node::internal(
                    Some(key.clone()),
                    new_sibling,
                    new_leaf,
                    path.l,
                    self.dummy(),
                    seq,
                )
            };
            let new_internal = Box::into_raw(Box::new(new_internal));

            if self.execute_insert(
                path.p,
                path.l,
                witness.pinfo,
                l.load_info(),
                new_internal,
                seq,
            ) {
                return None;
            }
        }
    }

    /// Re-checks frozenness and the counter, publishes the insert
    /// descriptor on `p`, and helps it to completion.
    ///
    /// Any failure frees the never-published triad and reports false so the
    /// caller retries.
    fn execute_insert(
        &self,
        p: *mut Node<K, V>,
        l: *mut Node<K, V>,
        pinfo: *mut Descriptor<K, V>,
        linfo: *mut Descriptor<K, V>,
        new_internal: *mut Node<K, V>,
        seq: u64,
    ) -> bool {
        // SAFETY: nodes and descriptors are retained while the tree is
        // alive; the triad is private until the publish CAS succeeds.
        unsafe {
            for (node, info) in [(p, pinfo), (l, linfo)] {
                if (*node).frozen_for(&*info) {
                    if matches!((*info).state(), UpdateState::Null | UpdateState::Try) {
                        self.help(info);
                    }
                    free_insert_triad(new_internal);
                    return false;
                }
            }
            if self.counter() != seq {
                free_insert_triad(new_internal);
                return false;
            }

            let descriptor = Box::into_raw(Box::new(Descriptor::for_insert(
                p,
                l,
                linfo,
                new_internal,
                seq,
            )));

            let p_ref = &*p;
            if ptr::eq(p_ref.load_info(), pinfo) && p_ref.cas_info(pinfo, descriptor) {
                debug_log!(seq, "insert descriptor published");
                let new_internal_ref = &*new_internal;
                self.registry.register_nodes(&[
                    new_internal,
                    new_internal_ref.load_child(true),
                    new_internal_ref.load_child(false),
                ]);
                self.registry.register_descriptor(descriptor);
                self.help(descriptor)
            } else {
                free_unpublished_descriptor(descriptor);
                free_insert_triad(new_internal);
                false
            }
        }
    }
}

/// Frees a triad that was never published: the router and its two fresh
/// leaves. The displaced leaf reachable through `prev` is shared and stays.
///
/// # Safety
///
/// `new_internal` must be a triad built by `put_if_absent` that lost before
/// publication.
unsafe fn free_insert_triad<K, V>(new_internal: *mut Node<K, V>) {
    unsafe {
        let left = (*new_internal).load_child(true);
        let right = (*new_internal).load_child(false);
        free_unpublished_node(left);
        free_unpublished_node(right);
        free_unpublished_node(new_internal);
    }
}
