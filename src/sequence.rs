//! Lazy asynchronous sequences.
//!
//! A [`Generator`] describes a finite sequence; every call to
//! [`Generator::stream`] starts a fresh production run from the first item.
//! Items are produced only when the consumer polls for them.

use std::time::Duration;

use futures::Stream;
use futures::stream;

use crate::cancel::CancellationSignal;
use crate::error::Result;
use crate::time;

/// Produces `0..count`, waiting `interval` before each item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generator {
    count: usize,
    interval: Duration,
}

impl Generator {
    pub fn new(count: usize, interval: Duration) -> Self {
        Self { count, interval }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start a new run. An empty generator ends without waiting.
    pub fn stream(&self) -> impl Stream<Item = usize> + Send + use<> {
        let Self { count, interval } = *self;
        stream::unfold(0, move |next| async move {
            if next >= count {
                return None;
            }
            time::delay(interval).await;
            Some((next, next + 1))
        })
    }

    /// Start a new run that observes `signal` before and during each wait.
    ///
    /// Once cancellation is observed the stream yields a single
    /// `Err(Error::Cancelled)` and ends. A run that is already cancelled
    /// yields that error even when `count` is zero.
    pub fn stream_cancellable(
        &self,
        signal: CancellationSignal,
    ) -> impl Stream<Item = Result<usize>> + Send + use<> {
        let Self { count, interval } = *self;
        stream::unfold(Some(0), move |state| {
            let signal = signal.clone();
            async move {
                let next = state?;
                if let Err(e) = signal.checkpoint() {
                    return Some((Err(e), None));
                }
                if next >= count {
                    return None;
                }
                match time::delay_cancellable(interval, &signal).await {
                    Ok(()) => Some((Ok(next), Some(next + 1))),
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
    }
}

/// Shorthand for `Generator::new(count, interval).stream()`.
pub fn generate(count: usize, interval: Duration) -> impl Stream<Item = usize> + Send + use<> {
    Generator::new(count, interval).stream()
}
