//! Cooperative advancement of published descriptors.
//!
//! Once a descriptor is installed on its connector, any thread that
//! observes it can (and must, before touching the same nodes) drive it to a
//! terminal state. Every step is a CAS gated by an expected-value read, so
//! an arbitrary number of helpers can replay the sequence without double
//! effects, and a stalled helper never blocks the others.

use std::ptr;

use crate::descriptor::{Descriptor, UpdateState};
use crate::tracing_helpers::trace_log;

use super::SnapTree;

impl<K, V> SnapTree<K, V> {
    /// Drives `d` toward a terminal state. Returns true iff it committed.
    ///
    /// `d` must be a published descriptor (the dummy is harmless: it is
    /// already terminal and the call falls through to `false`).
    pub(crate) fn help(&self, d: *mut Descriptor<K, V>) -> bool {
        // SAFETY: published descriptors and every node they reference are
        // retained while the tree is alive.
        let d_ref = unsafe { &*d };

        // Handshaking: the update either binds to its observed sequence
        // number, making it invisible to scans already in flight with older
        // views, or aborts so its initiator retries with a fresh one.
        if d_ref.state() == UpdateState::Null {
            if self.counter() == d_ref.handshake_seq() {
                d_ref.transition(UpdateState::Null, UpdateState::Try);
            } else {
                trace_log!(seq = d_ref.handshake_seq(), "handshake lost, aborting");
                d_ref.transition(UpdateState::Null, UpdateState::Abort);
            }
        }

        let mut success = d_ref.state() == UpdateState::Try;
        if success {
            // Mark the victims in order. The CAS may lose to another helper
            // installing the very same mark, so the decisive check is the
            // re-read: the mark holds iff the victim's info is now `d`.
            for mark in d_ref.mark_entries() {
                let node = unsafe { &*mark.node };
                if ptr::eq(node.load_info(), mark.expected) {
                    node.cas_info(mark.expected, d);
                }
                success = ptr::eq(node.load_info(), d);
                if !success {
                    break;
                }
            }
        }

        if success {
            // All victims are marked: swing the connector's child from the
            // first victim to the replacement. The expected-value gate makes
            // replayed swings no-ops (pointers are never reused, so the old
            // child value cannot reappear).
            let connector = unsafe { &*d_ref.connector() };
            let first = d_ref.first_marked();
            if ptr::eq(connector.load_child(true), first) {
                connector.cas_child(true, first, d_ref.new_node());
            } else if ptr::eq(connector.load_child(false), first) {
                connector.cas_child(false, first, d_ref.new_node());
            }
            d_ref.transition(UpdateState::Try, UpdateState::Commit);
        } else if d_ref.state() == UpdateState::Try {
            trace_log!("mark lost, aborting");
            d_ref.transition(UpdateState::Try, UpdateState::Abort);
        }

        d_ref.state() == UpdateState::Commit
    }
}
