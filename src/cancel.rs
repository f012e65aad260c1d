//! Cooperative cancellation.
//!
//! A [`CancellationSignal`] is passed explicitly into every operation that
//! wants to be cancellable. Setting it never interrupts anything on its own;
//! operations observe it at checkpoints.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::debug;

use crate::error::{Error, Result};
use crate::telemetry::metrics;

/// Shared, set-once cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every task waiting in [`cancelled`](Self::cancelled).
    /// Repeated calls are no-ops.
    pub fn request(&self) {
        if !self.inner.requested.swap(true, Ordering::AcqRel) {
            debug!("cancellation requested");
            metrics::cancellations_requested().add(1, &[]);
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// Fail with [`Error::Cancelled`] if the flag is set.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_requested() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the flag is set. Resolves immediately if already set.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking so a request between the check and
            // the await still wakes us.
            notified.as_mut().enable();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }

    /// Run `operation` between two checkpoints.
    ///
    /// The operation is never polled if the flag is already set. A request
    /// that lands while it runs is reported once it returns, discarding its
    /// value.
    pub async fn guard<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.checkpoint()?;
        let value = operation.await?;
        self.checkpoint()?;
        Ok(value)
    }
}
