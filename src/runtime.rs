//! The scheduler's quiescence primitive named in spec §4.4/§4.10
//! (`pendingCounter: &Runtime`).
//!
//! Because `push -> process -> emit` is a synchronous call chain on this
//! engine's hot path (see DESIGN.md), every operator — including
//! `summarize` — resolves within the calling `push`, so nothing in this
//! crate currently increments one of these. It's kept as the primitive a
//! future operator that defers work onto a background task would use to
//! give `StreamManager::flush`/`QueryEngine::stop_*` a real quiescence
//! point to await, matching the scheduling model the spec describes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct PendingCounter {
    count: AtomicU64,
    notify: Notify,
}

impl PendingCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            count: AtomicU64::new(0),
            notify: Notify::new(),
        })
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    pub fn is_quiescent(&self) -> bool {
        self.count.load(Ordering::SeqCst) == 0
    }

    /// Resolves once the counter reaches zero. A no-op if already quiescent.
    pub async fn finish(&self) {
        while !self.is_quiescent() {
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finish_resolves_immediately_when_empty() {
        let counter = PendingCounter::new();
        counter.finish().await;
    }

    #[tokio::test]
    async fn test_finish_waits_for_decrement() {
        let counter = PendingCounter::new();
        counter.increment();
        assert!(!counter.is_quiescent());

        let waiter = counter.clone();
        let handle = tokio::spawn(async move {
            waiter.finish().await;
        });

        counter.decrement();
        handle.await.unwrap();
    }
}
