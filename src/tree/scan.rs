//! Snapshot range scans.
//!
//! A scan adopts the pre-increment value of the version counter as its
//! view, then walks the tree as it existed at that view: every child read
//! goes through the per-node version chain, skipping nodes stamped after
//! the view. Because `prev` and `version_seq` are immutable, the walk needs
//! no synchronization with writers; the counter increment itself is what
//! forces concurrent updates to either carry the old view (and be ordered
//! before the scan) or abort and retry with a fresh one.

use std::sync::Arc;

use crate::descriptor::UpdateState;
use crate::node::Node;
use crate::scratch::ValueStack;

use super::SnapTree;

impl<K: Ord, V> SnapTree<K, V> {
    /// Returns the values of all keys in `[low, high]`, in ascending key
    /// order, as of one consistent snapshot of the map.
    ///
    /// The snapshot is established by the scan's counter increment: every
    /// update that committed with the scan's view (or an older one) is
    /// visible, every later update is not. After the increment the scan
    /// never waits on concurrent operations.
    ///
    /// # Panics
    ///
    /// Panics when `low > high`.
    pub fn range_scan(&self, low: &K, high: &K) -> Vec<Arc<V>> {
        assert!(low <= high, "range_scan requires low <= high");
        let _guard = self.collector.enter();

        let seq = self.advance_counter();

        let mut results = ValueStack::new();
        self.scan_into(self.root(), seq, low, high, &mut results);
        results.into_vec()
    }

    /// Recursive snapshot traversal under view `seq`.
    fn scan_into(
        &self,
        node: *mut Node<K, V>,
        seq: u64,
        low: &K,
        high: &K,
        out: &mut ValueStack<Arc<V>>,
    ) {
        // SAFETY: nodes and descriptors are retained while the tree is
        // alive; `read_child` preconditions hold along the walk.
        let n = unsafe { &*node };

        if n.is_leaf() {
            if let Some(k) = n.key() {
                if low <= k && k <= high {
                    if let Some(v) = n.value() {
                        out.push(Arc::clone(v));
                    }
                }
            }
            return;
        }

        // A busy router might be mid-swing; finish it before descending so
        // the snapshot includes every update bound to an older view.
        let info = n.load_info();
        if matches!(
            unsafe { &*info }.state(),
            UpdateState::Null | UpdateState::Try
        ) {
            self.help(info);
        }

        match n.key() {
            // Whole range right of the routing key.
            Some(k) if low >= k => self.scan_into(n.read_child(false, seq), seq, low, high, out),
            // Whole range left of it. Sentinel routers send every real key
            // left, so they always take this arm.
            Some(k) if high < k => self.scan_into(n.read_child(true, seq), seq, low, high, out),
            None => self.scan_into(n.read_child(true, seq), seq, low, high, out),
            // Routing key splits the range: left subtree first keeps the
            // output ascending.
            _ => {
                self.scan_into(n.read_child(true, seq), seq, low, high, out);
                self.scan_into(n.read_child(false, seq), seq, low, high, out);
            }
        }
    }
}
