//! `SnapTree` — a concurrent ordered map with snapshot range scans.
//!
//! This module provides the main [`SnapTree<K, V>`] type. Point operations
//! (`contains`, `get`, `put_if_absent`, `remove`) are lock-free; range
//! scans are wait-free after their initial counter increment and observe a
//! consistent snapshot of the map.
//!
//! # Protocol outline
//!
//! Updates never lock. An insert or delete searches for its leaf, validates
//! the links it is about to rewrite, builds the replacement nodes, then
//! publishes a [`Descriptor`](crate::descriptor::Descriptor) on the
//! connector node with one CAS. From that point any thread can finish the
//! update by driving the descriptor's state machine (see `help`): handshake
//! against the version counter, mark the victims, swing the child pointer,
//! commit. A scan bumps the counter and walks the tree through per-node
//! version chains, observing exactly the nodes whose stamp is at most its
//! view.

use std::fmt;
use std::ptr;
use std::sync::atomic::AtomicU64;

use seize::Collector;

use crate::alloc::Registry;
use crate::descriptor::Descriptor;
use crate::node::Node;
use crate::ordering::COUNTER_ORD;

mod delete;
mod help;
mod insert;
mod scan;
mod search;
mod validate;
mod verify;

#[cfg(loom)]
mod loom_tests;

/// A concurrent ordered map.
///
/// Keys live in the leaves of a binary search tree whose internal nodes
/// carry routing keys. Values are shared as `Arc<V>`, so reads hand out
/// cheap clones. All operations are safe to call from any number of
/// threads; none of them ever block.
///
/// # Example
///
/// ```
/// use snaptree::SnapTree;
///
/// let map: SnapTree<u64, &str> = SnapTree::new();
/// assert!(map.put_if_absent(5, "five").is_none());
/// assert!(map.contains(&5));
/// assert_eq!(*map.get(&5).unwrap(), "five");
///
/// let in_range = map.range_scan(&0, &9);
/// assert_eq!(in_range.len(), 1);
/// ```
pub struct SnapTree<K, V> {
    /// Sentinel root: internal, sentinel-keyed, never replaced.
    root: *mut Node<K, V>,
    /// Global version counter, advanced only by range scans.
    counter: AtomicU64,
    /// Shared terminal descriptor seeding every node's `info`.
    dummy: *mut Descriptor<K, V>,
    /// Reclamation context; every operation pins itself here.
    collector: Collector,
    /// Owns all published nodes and descriptors until drop.
    registry: Registry<K, V>,
}

// SAFETY: all shared mutable state is behind atomics, published memory is
// retained until drop, and values cross threads only as Arc clones.
unsafe impl<K: Send + Sync, V: Send + Sync> Send for SnapTree<K, V> {}
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for SnapTree<K, V> {}

impl<K, V> SnapTree<K, V> {
    /// Creates an empty map.
    ///
    /// The initial tree is all sentinels: a root whose two internal dummy
    /// children each hold two leaf dummies. This keeps every reachable leaf
    /// at depth two or more, so updates near an empty tree need no special
    /// cases beyond the ones the validation already covers.
    #[must_use]
    pub fn new() -> Self {
        let dummy = Box::into_raw(Box::new(Descriptor::dummy()));
        let sentinel_leaf =
            || Box::into_raw(Box::new(Node::leaf(None, None, ptr::null_mut(), dummy, 0)));

        let leaves = [
            sentinel_leaf(),
            sentinel_leaf(),
            sentinel_leaf(),
            sentinel_leaf(),
        ];
        let left_dummy = Box::into_raw(Box::new(Node::internal(
            None,
            leaves[0],
            leaves[1],
            ptr::null_mut(),
            dummy,
            0,
        )));
        let right_dummy = Box::into_raw(Box::new(Node::internal(
            None,
            leaves[2],
            leaves[3],
            ptr::null_mut(),
            dummy,
            0,
        )));
        let root = Box::into_raw(Box::new(Node::internal(
            None,
            left_dummy,
            right_dummy,
            ptr::null_mut(),
            dummy,
            0,
        )));

        let registry = Registry::new();
        registry.register_nodes(&leaves);
        registry.register_nodes(&[left_dummy, right_dummy, root]);
        registry.register_descriptor(dummy);

        Self {
            root,
            counter: AtomicU64::new(0),
            dummy,
            collector: Collector::new(),
            registry,
        }
    }

    /// Current value of the version counter.
    #[inline]
    pub(crate) fn counter(&self) -> u64 {
        self.counter.load(COUNTER_ORD)
    }

    /// Advances the version counter, returning the pre-increment value —
    /// the view a starting scan adopts.
    #[inline]
    pub(crate) fn advance_counter(&self) -> u64 {
        self.counter.fetch_add(1, COUNTER_ORD)
    }

    #[inline]
    pub(crate) fn root(&self) -> *mut Node<K, V> {
        self.root
    }

    #[inline]
    pub(crate) fn dummy(&self) -> *mut Descriptor<K, V> {
        self.dummy
    }
}

impl<K, V> Default for SnapTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for SnapTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapTree")
            .field("version", &self.counter())
            .finish_non_exhaustive()
    }
}

impl<K, V> Drop for SnapTree<K, V> {
    fn drop(&mut self) {
        // SAFETY: &mut self means no operation is in flight; every published
        // allocation is registered exactly once.
        unsafe { self.registry.release_all() };
    }
}
