//! Operation descriptors.
//!
//! A descriptor is the single coordination point of a multi-word update: it
//! names the connector node whose child pointer will be swung, the nodes to
//! be marked as logically removed together with the expected `info` values
//! used as CAS witnesses, the replacement subtree, and the handshaking
//! sequence number. Publishing the descriptor on the connector's `info`
//! field (one CAS) makes the whole update visible; any thread can then
//! drive it to a terminal state through [`crate::tree::SnapTree`]'s helper.
//!
//! # State machine
//!
//! ```text
//! Null ──(counter == handshake_seq)──> Try ──(marks + child swing)──> Commit
//!   │                                   │
//!   └──(counter moved)──> Abort <──(mark lost)──┘
//! ```
//!
//! Commit and Abort are terminal. Every transition is a CAS, so repeated
//! helping is idempotent.

use std::ptr;
use std::sync::atomic::AtomicU8;

use crate::node::Node;
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD};

/// State of an in-flight update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum UpdateState {
    /// Published, handshaking not yet performed.
    Null = 0,
    /// Handshaking succeeded; marking in progress.
    Try = 1,
    /// The replacement is installed and the marked nodes are removed.
    Commit = 2,
    /// The update lost a race or the counter moved; all nodes are idle.
    Abort = 3,
}

impl UpdateState {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Null,
            1 => Self::Try,
            2 => Self::Commit,
            3 => Self::Abort,
            _ => unreachable!("invalid update state"),
        }
    }
}

/// An [`UpdateState`] with atomic load and CAS.
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    #[inline]
    fn new(state: UpdateState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> UpdateState {
        UpdateState::from_u8(self.0.load(READ_ORD))
    }

    /// CAS `from -> to`; true when this call performed the transition.
    #[inline]
    pub(crate) fn transition(&self, from: UpdateState, to: UpdateState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, CAS_SUCCESS, CAS_FAILURE)
            .is_ok()
    }
}

/// One node to be marked, with the `info` value expected by the mark CAS.
pub(crate) struct MarkEntry<K, V> {
    pub(crate) node: *mut Node<K, V>,
    pub(crate) expected: *mut Descriptor<K, V>,
}

impl<K, V> MarkEntry<K, V> {
    #[inline]
    fn null() -> Self {
        Self {
            node: ptr::null_mut(),
            expected: ptr::null_mut(),
        }
    }
}

impl<K, V> Clone for MarkEntry<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for MarkEntry<K, V> {}

/// Record of an in-progress insert or delete.
///
/// Immutable except for `state`. An insert marks one node (the leaf being
/// replaced); a delete marks three (parent, leaf, sibling), in that order.
pub(crate) struct Descriptor<K, V> {
    state: AtomicState,
    /// Node whose child pointer connects the replacement to the tree.
    connector: *mut Node<K, V>,
    /// Victims, in marking order. Unused entries have a null node.
    marks: [MarkEntry<K, V>; 3],
    /// Replacement installed as a child of `connector`.
    new_node: *mut Node<K, V>,
    /// Counter value observed by the initiating operation.
    handshake_seq: u64,
}

impl<K, V> Descriptor<K, V> {
    /// The shared dummy: terminal from birth, marks nothing. Every node's
    /// `info` starts out pointing at the tree's dummy.
    pub(crate) fn dummy() -> Self {
        Self {
            state: AtomicState::new(UpdateState::Abort),
            connector: ptr::null_mut(),
            marks: [MarkEntry::null(); 3],
            new_node: ptr::null_mut(),
            handshake_seq: 0,
        }
    }

    /// Descriptor for an insert: swing a child of `connector` from `leaf`
    /// to `new_node`, marking `leaf`.
    pub(crate) fn for_insert(
        connector: *mut Node<K, V>,
        leaf: *mut Node<K, V>,
        leaf_expected: *mut Descriptor<K, V>,
        new_node: *mut Node<K, V>,
        handshake_seq: u64,
    ) -> Self {
        Self {
            state: AtomicState::new(UpdateState::Null),
            connector,
            marks: [
                MarkEntry {
                    node: leaf,
                    expected: leaf_expected,
                },
                MarkEntry::null(),
                MarkEntry::null(),
            ],
            new_node,
            handshake_seq,
        }
    }

    /// Descriptor for a delete: swing a child of `connector` from `parent`
    /// to `new_node`, marking `parent`, `leaf` and `sibling`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn for_delete(
        connector: *mut Node<K, V>,
        parent: *mut Node<K, V>,
        parent_expected: *mut Descriptor<K, V>,
        leaf: *mut Node<K, V>,
        leaf_expected: *mut Descriptor<K, V>,
        sibling: *mut Node<K, V>,
        sibling_expected: *mut Descriptor<K, V>,
        new_node: *mut Node<K, V>,
        handshake_seq: u64,
    ) -> Self {
        Self {
            state: AtomicState::new(UpdateState::Null),
            connector,
            marks: [
                MarkEntry {
                    node: parent,
                    expected: parent_expected,
                },
                MarkEntry {
                    node: leaf,
                    expected: leaf_expected,
                },
                MarkEntry {
                    node: sibling,
                    expected: sibling_expected,
                },
            ],
            new_node,
            handshake_seq,
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> UpdateState {
        self.state.load()
    }

    /// CAS the state `from -> to`; true when this call performed it.
    #[inline]
    pub(crate) fn transition(&self, from: UpdateState, to: UpdateState) -> bool {
        self.state.transition(from, to)
    }

    #[inline]
    pub(crate) fn connector(&self) -> *mut Node<K, V> {
        self.connector
    }

    #[inline]
    pub(crate) fn new_node(&self) -> *mut Node<K, V> {
        self.new_node
    }

    #[inline]
    pub(crate) fn handshake_seq(&self) -> u64 {
        self.handshake_seq
    }

    /// First victim; the child of `connector` to be swung away from.
    #[inline]
    pub(crate) fn first_marked(&self) -> *mut Node<K, V> {
        self.marks[0].node
    }

    /// Victims in marking order.
    #[inline]
    pub(crate) fn mark_entries(&self) -> impl Iterator<Item = MarkEntry<K, V>> + '_ {
        self.marks.iter().copied().filter(|m| !m.node.is_null())
    }

    /// True when `node` is one of this descriptor's victims.
    #[inline]
    pub(crate) fn is_marked(&self, node: *const Node<K, V>) -> bool {
        self.marks
            .iter()
            .any(|m| ptr::eq(m.node, node.cast_mut()))
    }
}
