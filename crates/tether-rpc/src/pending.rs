//! Outstanding server-to-client calls, keyed by correlation id.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use tether_core::Epoch;

/// A request sent to the peer that has not been answered yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCall {
    /// Method the request invoked.
    pub method: String,
    /// When the request was sent.
    pub sent_at: Epoch,
}

/// Per-session table of outstanding outbound requests.
#[derive(Debug)]
pub struct PendingCalls {
    next_id: AtomicI64,
    calls: DashMap<i64, PendingCall>,
}

impl PendingCalls {
    /// Create an empty table. Ids start at 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            calls: DashMap::new(),
        }
    }

    /// Allocate an id and record a call to `method` under it.
    pub fn register(&self, method: &str) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.calls.insert(
            id,
            PendingCall {
                method: method.to_string(),
                sent_at: Epoch::now(),
            },
        );
        id
    }

    /// Remove and return the call recorded under `id`.
    pub fn take(&self, id: i64) -> Option<PendingCall> {
        self.calls.remove(&id).map(|(_, call)| call)
    }

    /// Remove the call under `id` only if it was for `method`.
    pub fn take_matching(&self, id: i64, method: &str) -> Option<PendingCall> {
        self.calls
            .remove_if(&id, |_, call| call.method == method)
            .map(|(_, call)| call)
    }

    /// Drop calls sent before `cutoff`. Returns how many were dropped.
    pub fn expire(&self, cutoff: Epoch) -> usize {
        let before = self.calls.len();
        self.calls.retain(|_, call| call.sent_at >= cutoff);
        before.saturating_sub(self.calls.len())
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether no calls are outstanding.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}
