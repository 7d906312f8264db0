//! Allocation tracking for nodes and descriptors.
//!
//! Nodes and descriptors are heap-allocated with `Box::into_raw` and shared
//! through atomic pointers, so something must own them for cleanup. The
//! [`Registry`] records every pointer that was *published* (made reachable
//! to other threads through a successful CAS) and frees them all when the
//! tree drops.
//!
//! Published memory is never freed earlier: superseded nodes stay reachable
//! through `prev` chains for snapshot readers, and the protocol's CAS
//! witnesses assume no pointer value is ever reused while a thread could
//! still compare against it. Reclamation of old versions during the tree's
//! lifetime is the surrounding system's concern; the seize collector owned
//! by the tree pins every operation so a deferred-retirement policy can be
//! layered on without changing the protocol.
//!
//! Allocations that lose their publication CAS were never visible to any
//! other thread and are freed eagerly by the operation that made them.

use parking_lot::Mutex;

use crate::descriptor::Descriptor;
use crate::node::Node;

/// Registry of published allocations, freed when the owning tree drops.
pub(crate) struct Registry<K, V> {
    nodes: Mutex<Vec<*mut Node<K, V>>>,
    descriptors: Mutex<Vec<*mut Descriptor<K, V>>>,
}

impl<K, V> Registry<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            descriptors: Mutex::new(Vec::new()),
        }
    }

    /// Record published nodes. Each pointer must be registered exactly once.
    pub(crate) fn register_nodes(&self, nodes: &[*mut Node<K, V>]) {
        self.nodes.lock().extend_from_slice(nodes);
    }

    /// Record a published descriptor. Must be registered exactly once.
    pub(crate) fn register_descriptor(&self, descriptor: *mut Descriptor<K, V>) {
        self.descriptors.lock().push(descriptor);
    }

    /// Free every registered allocation.
    ///
    /// # Safety
    ///
    /// No other thread may hold a reference into the tree; every registered
    /// pointer must have come from `Box::into_raw` and be registered only
    /// once.
    pub(crate) unsafe fn release_all(&mut self) {
        for node in self.nodes.get_mut().drain(..) {
            drop(unsafe { Box::from_raw(node) });
        }
        for descriptor in self.descriptors.get_mut().drain(..) {
            drop(unsafe { Box::from_raw(descriptor) });
        }
    }
}

/// Free a node that was never published.
///
/// # Safety
///
/// `node` must come from `Box::into_raw` and must never have been made
/// reachable to another thread.
pub(crate) unsafe fn free_unpublished_node<K, V>(node: *mut Node<K, V>) {
    drop(unsafe { Box::from_raw(node) });
}

/// Free a descriptor that was never published.
///
/// # Safety
///
/// Same contract as [`free_unpublished_node`].
pub(crate) unsafe fn free_unpublished_descriptor<K, V>(descriptor: *mut Descriptor<K, V>) {
    drop(unsafe { Box::from_raw(descriptor) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;
    use std::sync::Arc;

    #[test]
    fn release_all_frees_registered_allocations() {
        let mut registry: Registry<i64, u64> = Registry::new();
        let value = Arc::new(11u64);

        let d = Box::into_raw(Box::new(Descriptor::dummy()));
        let leaf = Box::into_raw(Box::new(Node::leaf(
            Some(1),
            Some(Arc::clone(&value)),
            ptr::null_mut(),
            d,
            0,
        )));
        registry.register_nodes(&[leaf]);
        registry.register_descriptor(d);

        unsafe { registry.release_all() };
        // The node's Arc clone was dropped with it.
        assert_eq!(Arc::strong_count(&value), 1);
    }
}
