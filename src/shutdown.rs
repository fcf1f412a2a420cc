//! Graceful shutdown coordination.
//!
//! A watch channel broadcasts the shutdown signal to every open stream, and
//! an active-stream counter lets the server wait for them to drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};

use crate::metrics;

/// Shutdown coordinator for graceful termination.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<ShutdownInner>,
}

struct ShutdownInner {
    shutdown_tx: watch::Sender<bool>,
    active_streams: AtomicU64,
    drain_notify: Notify,
    next_stream_id: AtomicU64,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ShutdownInner {
                shutdown_tx,
                active_streams: AtomicU64::new(0),
                drain_notify: Notify::new(),
                next_stream_id: AtomicU64::new(1),
            }),
        }
    }

    /// Signal shutdown to all streams.
    pub fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Get a receiver to watch for shutdown.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_tx.subscribe()
    }

    /// Resolve once shutdown has been signaled.
    pub async fn signaled(&self) {
        let mut rx = self.subscribe();
        // Only errors if the sender is dropped, which `self` prevents.
        let _ = rx.wait_for(|down| *down).await;
    }

    pub fn active_streams(&self) -> u64 {
        self.inner.active_streams.load(Ordering::Relaxed)
    }

    /// Register an open stream; the guard unregisters it on drop.
    pub fn register_stream(&self) -> StreamGuard {
        let id = self.inner.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let count = self.inner.active_streams.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_active_streams(count);

        StreamGuard {
            coordinator: self.clone(),
            id,
        }
    }

    /// Wait until no streams are registered.
    pub async fn wait_for_drain(&self) {
        loop {
            // Create the notified future before the load so a concurrent
            // unregister between the two cannot be missed.
            let notified = self.inner.drain_notify.notified();
            if self.active_streams() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn unregister_stream(&self) {
        let result = self.inner.active_streams.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |curr| curr.checked_sub(1),
        );

        match result {
            Ok(prev) => {
                let count = prev - 1;
                metrics::set_active_streams(count);
                if count == 0 {
                    self.inner.drain_notify.notify_waiters();
                }
            }
            Err(_) => {
                tracing::error!("unregister_stream called with no active streams");
                metrics::set_active_streams(0);
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one stream counted as active.
pub struct StreamGuard {
    coordinator: ShutdownCoordinator,
    id: u64,
}

impl StreamGuard {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolve once shutdown has been signaled.
    pub async fn signaled(&self) {
        self.coordinator.signaled().await
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.coordinator.unregister_stream();
    }
}
