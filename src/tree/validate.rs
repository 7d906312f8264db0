//! Link and leaf validation.
//!
//! Updates only ever rewrite links they have certified. A certification
//! says: at some instant during the check, the parent was quiet (its
//! descriptor terminal), not logically removed, and really had the claimed
//! child. The descriptor witnessed during certification doubles as the
//! expected value of the later `info` CAS, so any intervening operation on
//! the parent makes that CAS fail rather than corrupt the tree.

use std::ptr;

use crate::descriptor::{Descriptor, UpdateState};
use crate::node::Node;

use super::SnapTree;

/// Witnesses returned by a successful leaf validation.
pub(crate) struct LeafWitness<K, V> {
    /// Descriptor witnessed on the grandparent; null when `p` is the root.
    pub(crate) gpinfo: *mut Descriptor<K, V>,
    /// Descriptor witnessed on the parent.
    pub(crate) pinfo: *mut Descriptor<K, V>,
}

impl<K: Ord, V> SnapTree<K, V> {
    /// Certifies the link `p -> c` on the indicated side.
    ///
    /// Helps and fails when `p` is busy; otherwise succeeds iff `p` is not
    /// logically removed and its child pointer still equals `c`, returning
    /// the witnessed descriptor.
    pub(crate) fn validate_link(
        &self,
        p: &Node<K, V>,
        c: *mut Node<K, V>,
        left: bool,
    ) -> Option<*mut Descriptor<K, V>> {
        let pinfo = p.load_info();
        // SAFETY: descriptors are retained while the tree is alive.
        let pinfo_ref = unsafe { &*pinfo };
        match pinfo_ref.state() {
            UpdateState::Null | UpdateState::Try => {
                // In-progress operation owns `p`: help it, fail this attempt.
                self.help(pinfo);
                None
            }
            state => {
                let removed = pinfo_ref.is_marked(p) && state == UpdateState::Commit;
                if !removed && ptr::eq(p.load_child(left), c) {
                    Some(pinfo)
                } else {
                    None
                }
            }
        }
    }

    /// Certifies the leaf `l` by validating `p -> l` and, unless `p` is the
    /// root, `gp -> p`.
    ///
    /// The final re-reads are essential: they detect a parent that became
    /// busy between its link validation and this moment, which would
    /// otherwise let a stale witness slip into the publish CAS.
    pub(crate) fn validate_leaf(
        &self,
        gp: *mut Node<K, V>,
        p: *mut Node<K, V>,
        l: *mut Node<K, V>,
        key: &K,
    ) -> Option<LeafWitness<K, V>> {
        // SAFETY: path nodes are retained while the tree is alive.
        unsafe {
            let p_ref = &*p;
            let pinfo = self.validate_link(p_ref, l, p_ref.routes_left(key))?;

            let at_root = ptr::eq(p, self.root());
            let gpinfo = if at_root {
                ptr::null_mut()
            } else {
                let gp_ref = &*gp;
                self.validate_link(gp_ref, p, gp_ref.routes_left(key))?
            };

            if !ptr::eq(p_ref.load_info(), pinfo) {
                return None;
            }
            if !at_root && !ptr::eq((*gp).load_info(), gpinfo) {
                return None;
            }

            Some(LeafWitness { gpinfo, pinfo })
        }
    }
}
