//! Cooperative cancellation and the pending-request registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// Fires the cancellation signal for one in-flight request.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Awaitable side of a cancellation pair.
#[derive(Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    /// Fire the signal. Idempotent; cancelling before the signal is
    /// awaited still cancels (level-triggered, not edge-triggered).
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelSignal {
    /// Resolves once the paired handle fires.
    ///
    /// If the handle is dropped without firing, no cancellation can ever
    /// arrive and this future stays pending forever.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// In-memory map from request key to the cancellation handle of the most
/// recently dispatched request with that key.
///
/// Entries are inserted at dispatch and removed when the request settles
/// (success, business error, transport error, or cancellation) — the map
/// never outlives its in-flight requests. It is bookkeeping for
/// [`cancel_all`](PendingRegistry::cancel_all) and the optional
/// duplicate-abort policy, not an execution-dedup cache.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    inner: Mutex<HashMap<String, (u64, CancelHandle)>>,
    next_ticket: AtomicU64,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dispatching request; returns the signal its dispatch
    /// path races against plus a ticket identifying this registration.
    /// With `cancel_previous`, an already-pending request under the same
    /// key is aborted first; otherwise its handle is simply replaced.
    pub fn register(&self, key: &str, cancel_previous: bool) -> (CancelSignal, u64) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (handle, signal) = cancel_pair();
        let mut map = self.inner.lock().unwrap();
        if let Some((_, previous)) = map.insert(key.to_string(), (ticket, handle)) {
            if cancel_previous {
                previous.cancel();
            }
        }
        (signal, ticket)
    }

    /// Remove a settled request. The ticket guards against a displaced
    /// dispatch removing the entry of a newer request with the same key;
    /// a stale or already-removed registration is a no-op.
    pub fn remove(&self, key: &str, ticket: u64) {
        let mut map = self.inner.lock().unwrap();
        if map.get(key).map(|(owner, _)| *owner) == Some(ticket) {
            map.remove(key);
        }
    }

    /// Abort every in-flight request and clear the registry.
    pub fn cancel_all(&self) {
        let mut map = self.inner.lock().unwrap();
        for (_, handle) in map.values() {
            handle.cancel();
        }
        map.clear();
    }

    /// Number of requests currently tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
