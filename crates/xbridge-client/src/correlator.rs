//! Request/response correlation.
//!
//! Every correlated command carries a uid unique among in-flight calls from
//! this process. The calling thread registers a pending call, pushes the
//! command, and blocks on its own slot; the response pump routes each
//! inbound response to exactly the slot registered under its uid. Matching
//! is strictly by uid, never by arrival order, so a malformed responder can
//! starve its own call (timeout) but can never complete someone else's.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use xbridge_config::{log_client_debug, log_client_warn};

/// Produces uids unique among currently-pending calls. Monotonic counter;
/// wraparound skips 0, which is reserved for fire-and-forget.
pub struct UidSource {
    next: AtomicU64,
}

impl UidSource {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        loop {
            let uid = self.next.fetch_add(1, Ordering::Relaxed);
            if uid != 0 {
                return uid;
            }
        }
    }
}

impl Default for UidSource {
    fn default() -> Self {
        Self::new()
    }
}

enum SlotState {
    Pending,
    Completed(Vec<u8>),
}

struct Slot {
    state: Mutex<SlotState>,
    cv: Condvar,
}

/// What became of one in-flight call.
#[derive(Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The correlated response arrived; here is its payload.
    Completed(Vec<u8>),
    /// The deadline elapsed first. The uid is retired; a late response
    /// will be discarded with a diagnostic.
    TimedOut,
}

pub struct Correlator {
    pending: Mutex<HashMap<u64, Arc<Slot>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a pending call BEFORE pushing the command, so a fast
    /// response can never race past its waiter.
    pub fn register(&self, uid: u64) -> PendingCall<'_> {
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState::Pending),
            cv: Condvar::new(),
        });
        let prev = self.pending.lock().unwrap().insert(uid, slot.clone());
        debug_assert!(prev.is_none(), "uid {uid} already pending");
        PendingCall {
            correlator: self,
            uid,
            slot,
        }
    }

    /// Route an inbound response to the call registered under `uid`. A
    /// response for an unknown (timed-out, or never issued) uid is dropped;
    /// that is a diagnostic, not a bridge failure.
    pub fn resolve(&self, uid: u64, payload: Vec<u8>) {
        let slot = self.pending.lock().unwrap().remove(&uid);
        match slot {
            Some(slot) => {
                *slot.state.lock().unwrap() = SlotState::Completed(payload);
                slot.cv.notify_one();
            }
            None => {
                log_client_warn!("discarding response for unknown or expired uid", uid = uid);
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn deregister(&self, uid: u64) {
        self.pending.lock().unwrap().remove(&uid);
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

/// One in-flight correlated request, exclusively owned by the thread that
/// issued it. Dropping it (with or without waiting) retires the uid.
pub struct PendingCall<'a> {
    correlator: &'a Correlator,
    uid: u64,
    slot: Arc<Slot>,
}

impl PendingCall<'_> {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Block the calling thread until the response arrives or `timeout`
    /// elapses. Exactly this thread wakes on resolution; other pending
    /// calls are untouched.
    pub fn wait(self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock().unwrap();
        loop {
            if let SlotState::Completed(_) = *state {
                let payload =
                    match std::mem::replace(&mut *state, SlotState::Pending) {
                        SlotState::Completed(p) => p,
                        SlotState::Pending => unreachable!(),
                    };
                drop(state);
                return WaitOutcome::Completed(payload);
            }
            let now = Instant::now();
            if now >= deadline {
                drop(state);
                log_client_debug!("pending call timed out", uid = self.uid);
                // Drop impl deregisters; the uid is never revived.
                return WaitOutcome::TimedOut;
            }
            let (guard, _timeout) = self
                .slot
                .cv
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
        }
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        // No-op when already resolved (resolve removed the entry).
        self.correlator.deregister(self.uid);
    }
}
