//! Tree nodes.
//!
//! The tree is leaf-oriented: user keys live only in leaves, internal nodes
//! carry routing keys. A node is a leaf exactly when its left child pointer
//! is null. Sentinel nodes carry `None` keys; searches route left at a
//! sentinel-keyed router, so sentinel leaves sit on the right edge of the
//! tree and are never reached by a key search.
//!
//! Every node is stamped at construction with the version counter value its
//! creating operation observed (`version_seq`) and a pointer to the node it
//! replaced (`prev`). Both are immutable, which is what lets readers walk
//! backward in version time without synchronizing with writers.

use std::ptr;
use std::sync::Arc;
use std::sync::atomic::AtomicPtr;

use crate::descriptor::{Descriptor, UpdateState};
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD};

/// A node of the versioned tree.
///
/// `left`, `right` and `info` are the only mutable fields, each updated by
/// single-word CAS. `prev` and `version_seq` never change after
/// construction.
pub(crate) struct Node<K, V> {
    /// Routing key (internal) or user key (leaf). `None` is the sentinel.
    key: Option<K>,
    /// Present only on leaves holding a user key.
    value: Option<Arc<V>>,
    /// Null on leaves, non-null on internal nodes.
    left: AtomicPtr<Node<K, V>>,
    right: AtomicPtr<Node<K, V>>,
    /// The node this one replaced, or null for original nodes.
    prev: *mut Node<K, V>,
    /// Descriptor currently owning this node.
    info: AtomicPtr<Descriptor<K, V>>,
    /// Version counter value observed by the creating operation.
    version_seq: u64,
}

impl<K, V> Node<K, V> {
    /// Creates a leaf node.
    pub(crate) fn leaf(
        key: Option<K>,
        value: Option<Arc<V>>,
        prev: *mut Node<K, V>,
        info: *mut Descriptor<K, V>,
        version_seq: u64,
    ) -> Self {
        Self {
            key,
            value,
            left: AtomicPtr::new(ptr::null_mut()),
            right: AtomicPtr::new(ptr::null_mut()),
            prev,
            info: AtomicPtr::new(info),
            version_seq,
        }
    }

    /// Creates an internal node. Both children must be non-null.
    pub(crate) fn internal(
        key: Option<K>,
        left: *mut Node<K, V>,
        right: *mut Node<K, V>,
        prev: *mut Node<K, V>,
        info: *mut Descriptor<K, V>,
        version_seq: u64,
    ) -> Self {
        debug_assert!(!left.is_null() && !right.is_null());
        Self {
            key,
            value: None,
            left: AtomicPtr::new(left),
            right: AtomicPtr::new(right),
            prev,
            info: AtomicPtr::new(info),
            version_seq,
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    #[inline]
    pub(crate) fn value(&self) -> Option<&Arc<V>> {
        self.value.as_ref()
    }

    #[inline]
    pub(crate) fn prev(&self) -> *mut Node<K, V> {
        self.prev
    }

    #[inline]
    pub(crate) fn version_seq(&self) -> u64 {
        self.version_seq
    }

    /// A node is a leaf exactly when its left child is null.
    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.left.load(READ_ORD).is_null()
    }

    #[inline]
    pub(crate) fn load_child(&self, left: bool) -> *mut Node<K, V> {
        if left {
            self.left.load(READ_ORD)
        } else {
            self.right.load(READ_ORD)
        }
    }

    /// CAS the indicated child pointer. Returns true when this call
    /// performed the swap.
    #[inline]
    pub(crate) fn cas_child(
        &self,
        left: bool,
        expected: *mut Node<K, V>,
        new: *mut Node<K, V>,
    ) -> bool {
        let slot = if left { &self.left } else { &self.right };
        slot.compare_exchange(expected, new, CAS_SUCCESS, CAS_FAILURE)
            .is_ok()
    }

    #[inline]
    pub(crate) fn load_info(&self) -> *mut Descriptor<K, V> {
        self.info.load(READ_ORD)
    }

    /// CAS the owning descriptor. Returns true when this call performed
    /// the swap.
    #[inline]
    pub(crate) fn cas_info(
        &self,
        expected: *mut Descriptor<K, V>,
        new: *mut Descriptor<K, V>,
    ) -> bool {
        self.info
            .compare_exchange(expected, new, CAS_SUCCESS, CAS_FAILURE)
            .is_ok()
    }

    /// Frozen predicate: this node may not be targeted by new updates.
    ///
    /// `d` is the descriptor witnessed on this node by the caller. The node
    /// is frozen when the descriptor's operation is still in progress
    /// (requires help) or when the descriptor committed and marks this node
    /// (the node has been logically removed).
    pub(crate) fn frozen_for(&self, d: &Descriptor<K, V>) -> bool {
        let state = d.state();
        matches!(state, UpdateState::Null | UpdateState::Try)
            || (d.is_marked(self) && state == UpdateState::Commit)
    }

    /// Returns the child that an operation with sequence number `seq`
    /// should observe: the indicated child, walked backward through the
    /// version chain until `version_seq <= seq`.
    ///
    /// Precondition: `self.version_seq <= seq`, which guarantees the walk
    /// terminates (the oldest node of any chain is at most as new as its
    /// parent).
    pub(crate) fn read_child(&self, left: bool, seq: u64) -> *mut Node<K, V> {
        debug_assert!(self.version_seq <= seq);
        let mut child = self.load_child(left);
        // SAFETY: nodes are never freed while the tree is alive, and
        // `prev`/`version_seq` are immutable after construction.
        unsafe {
            while (*child).version_seq > seq {
                child = (*child).prev;
            }
        }
        child
    }

    /// True when a search for `key` descends into the left subtree.
    /// Sentinel-keyed routers send every search left.
    #[inline]
    pub(crate) fn routes_left(&self, key: &K) -> bool
    where
        K: Ord,
    {
        match &self.key {
            None => true,
            Some(k) => key < k,
        }
    }

    /// True when this node holds exactly `key` (never true for sentinels).
    #[inline]
    pub(crate) fn key_equals(&self, key: &K) -> bool
    where
        K: Ord,
    {
        matches!(&self.key, Some(k) if k == key)
    }
}
