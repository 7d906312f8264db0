//! # snaptree
//!
//! A concurrent ordered map with lock-free point operations and wait-free
//! range scans over a consistent snapshot, after the persistent
//! non-blocking BST of Fatourou, Ruppert and Papavasileiou ("Persistent
//! Non-Blocking Binary Search Trees Supporting Wait-Free Range Queries").
//!
//! ## Design
//!
//! - Leaf-oriented BST: user keys live only in leaves, internal nodes are
//!   routers. Sentinel (`None`) keys pad the tree so updates never need
//!   root special cases.
//! - Bounded persistence: every node is stamped with the version counter
//!   value at its creation and links to the node it replaced. Scans walk
//!   these chains to observe the tree as of their own counter view.
//! - Descriptor-based multi-word commits: an update publishes a descriptor
//!   with one CAS and any thread can finish it (handshake, mark victims,
//!   swing the child pointer, commit). No locks anywhere.
//!
//! ## Concurrency model
//!
//! - `contains` / `get` / `put_if_absent` / `remove` are linearizable and
//!   lock-free: a stalled thread can never prevent system-wide progress,
//!   because whoever observes an unfinished descriptor helps it.
//! - `range_scan` is wait-free after its initial counter increment and
//!   returns values for one consistent snapshot, in ascending key order.
//! - Memory: nodes and descriptors are retained until the map drops, which
//!   is what keeps old versions readable and CAS witnesses unambiguous.
//!   Reclaiming superseded versions earlier is the surrounding system's
//!   concern.
//!
//! ## Example
//!
//! ```
//! use snaptree::SnapTree;
//!
//! let map: SnapTree<u64, String> = SnapTree::new();
//! map.put_if_absent(3, "three".to_owned());
//! map.put_if_absent(1, "one".to_owned());
//! map.put_if_absent(2, "two".to_owned());
//!
//! let snapshot = map.range_scan(&1, &2);
//! assert_eq!(snapshot.len(), 2);
//! assert_eq!(*snapshot[0], "one");
//! assert_eq!(*snapshot[1], "two");
//! ```

mod alloc;
mod descriptor;
mod node;
mod ordering;
mod scratch;
mod tracing_helpers;
pub mod tree;

pub use tree::SnapTree;
