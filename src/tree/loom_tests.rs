//! Loom model checks for the descriptor commit protocol.
//!
//! Loom explores thread interleavings deterministically, which is the only
//! practical way to cover the windows between handshake, mark and swing.
//! The full tree is far too large a state space, so these tests model the
//! protocol itself: one descriptor, one victim, one child slot, and the
//! version counter — the same CAS sequence `help` performs, with the same
//! expected-value gates.
//!
//! Run with: `RUSTFLAGS="--cfg loom" cargo test --lib tree::loom_tests`

use loom::sync::Arc;
use loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering::SeqCst};
use loom::thread;

const NULL: usize = 0;
const TRY: usize = 1;
const COMMIT: usize = 2;
const ABORT: usize = 3;

/// Victim info: the pre-published witness value.
const WITNESS: usize = 0;
/// Victim info: marked by the descriptor.
const MARKED: usize = 1;

const OLD_CHILD: usize = 10;
const NEW_CHILD: usize = 20;

/// One descriptor's worth of protocol state.
struct Protocol {
    counter: AtomicU64,
    handshake_seq: u64,
    state: AtomicUsize,
    victim_info: AtomicUsize,
    child: AtomicUsize,
}

impl Protocol {
    fn new(counter: u64, handshake_seq: u64) -> Self {
        Self {
            counter: AtomicU64::new(counter),
            handshake_seq,
            state: AtomicUsize::new(NULL),
            victim_info: AtomicUsize::new(WITNESS),
            child: AtomicUsize::new(OLD_CHILD),
        }
    }

    /// The helper state machine, shaped exactly like `SnapTree::help`.
    fn help(&self) -> bool {
        if self.state.load(SeqCst) == NULL {
            if self.counter.load(SeqCst) == self.handshake_seq {
                let _ = self.state.compare_exchange(NULL, TRY, SeqCst, SeqCst);
            } else {
                let _ = self.state.compare_exchange(NULL, ABORT, SeqCst, SeqCst);
            }
        }

        let mut success = self.state.load(SeqCst) == TRY;
        if success {
            if self.victim_info.load(SeqCst) == WITNESS {
                let _ = self
                    .victim_info
                    .compare_exchange(WITNESS, MARKED, SeqCst, SeqCst);
            }
            success = self.victim_info.load(SeqCst) == MARKED;
        }

        if success {
            if self.child.load(SeqCst) == OLD_CHILD {
                let _ = self
                    .child
                    .compare_exchange(OLD_CHILD, NEW_CHILD, SeqCst, SeqCst);
            }
            let _ = self.state.compare_exchange(TRY, COMMIT, SeqCst, SeqCst);
        } else if self.state.load(SeqCst) == TRY {
            let _ = self.state.compare_exchange(TRY, ABORT, SeqCst, SeqCst);
        }

        self.state.load(SeqCst) == COMMIT
    }
}

#[test]
fn concurrent_helpers_agree_and_swing_once() {
    loom::model(|| {
        let proto = Arc::new(Protocol::new(7, 7));

        let a = {
            let proto = Arc::clone(&proto);
            thread::spawn(move || proto.help())
        };
        let b = {
            let proto = Arc::clone(&proto);
            thread::spawn(move || proto.help())
        };

        let ra = a.join().unwrap();
        let rb = b.join().unwrap();

        // The counter never moves, so the handshake must succeed and every
        // helper must report the commit.
        assert!(ra && rb);
        assert_eq!(proto.state.load(SeqCst), COMMIT);
        assert_eq!(proto.victim_info.load(SeqCst), MARKED);
        assert_eq!(proto.child.load(SeqCst), NEW_CHILD);
    });
}

#[test]
fn handshake_racing_a_scan_commits_or_aborts_cleanly() {
    loom::model(|| {
        let proto = Arc::new(Protocol::new(7, 7));

        let helper = {
            let proto = Arc::clone(&proto);
            thread::spawn(move || proto.help())
        };
        let scanner = {
            let proto = Arc::clone(&proto);
            // A starting scan advances the counter.
            thread::spawn(move || proto.counter.fetch_add(1, SeqCst))
        };

        let committed = helper.join().unwrap();
        let _ = scanner.join().unwrap();

        match proto.state.load(SeqCst) {
            // Handshake won the race: the update is fully applied.
            COMMIT => {
                assert!(committed);
                assert_eq!(proto.child.load(SeqCst), NEW_CHILD);
            }
            // Handshake lost: nothing was touched.
            ABORT => {
                assert!(!committed);
                assert_eq!(proto.victim_info.load(SeqCst), WITNESS);
                assert_eq!(proto.child.load(SeqCst), OLD_CHILD);
            }
            state => panic!("non-terminal state after help: {state}"),
        }
    });
}
