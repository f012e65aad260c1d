//! Timer-backed delays.
//!
//! A delay parks on the runtime timer wheel; no worker thread is held while
//! it waits.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::{Instant, Sleep};

use crate::cancel::CancellationSignal;
use crate::error::{Error, Result};

/// Completes once at least `duration` has elapsed since [`delay`] was called.
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[derive(Debug)]
pub struct Delay {
    sleep: Pin<Box<Sleep>>,
    duration: Duration,
}

impl Delay {
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn deadline(&self) -> Instant {
        self.sleep.deadline()
    }

    pub fn is_elapsed(&self) -> bool {
        self.sleep.is_elapsed()
    }
}

impl Future for Delay {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.sleep.as_mut().poll(cx)
    }
}

/// Create a delay. The deadline is fixed now, not at first poll.
pub fn delay(duration: Duration) -> Delay {
    Delay {
        sleep: Box::pin(tokio::time::sleep(duration)),
        duration,
    }
}

/// Wait for `duration` unless `signal` is set first.
///
/// Checks the signal before arming the timer, so an already-cancelled caller
/// does no waiting at all.
pub async fn delay_cancellable(duration: Duration, signal: &CancellationSignal) -> Result<()> {
    signal.checkpoint()?;
    tokio::select! {
        biased;
        _ = signal.cancelled() => Err(Error::Cancelled),
        _ = delay(duration) => Ok(()),
    }
}
