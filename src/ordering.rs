//! Standard memory orderings for the coordination protocol.
//!
//! Every atomic access in the crate names its ordering through one of these
//! constants so the synchronization intent is visible at the access point.

use std::sync::atomic::Ordering;

/// Ordering for loading node children and descriptor pointers.
/// Pairs with the Release half of [`CAS_SUCCESS`].
pub(crate) const READ_ORD: Ordering = Ordering::Acquire;

/// Ordering for successful CAS on child pointers, `info` fields, and
/// descriptor states. The Release half publishes the nodes reachable
/// through the swapped-in pointer.
pub(crate) const CAS_SUCCESS: Ordering = Ordering::AcqRel;

/// Ordering for a failed CAS. Only the current value is needed.
pub(crate) const CAS_FAILURE: Ordering = Ordering::Acquire;

/// Ordering for the global version counter.
///
/// Handshaking compares a previously loaded counter value against the
/// current one, and a scan's increment must be globally visible before the
/// scan starts traversing. SeqCst on every counter access gives both a
/// single total order.
pub(crate) const COUNTER_ORD: Ordering = Ordering::SeqCst;
