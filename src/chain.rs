//! Sequential continuation chains.
//!
//! A [`Chain`] is an ordered list of async steps. Each step receives the
//! previous step's output and its own position, and the driver runs them one
//! after another. Nothing overlaps, so total latency is the sum of the steps.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt as _;
use futures::future::BoxFuture;
use tracing::{debug, trace, warn};

use crate::cancel::CancellationSignal;
use crate::error::{Error, Result};
use crate::time;

/// Boxed future returned by a chain step.
pub type StepFuture<T> = BoxFuture<'static, Result<T>>;

type StepFn<T> = Arc<dyn Fn(T, usize) -> StepFuture<T> + Send + Sync>;

/// Ordered pipeline of transformation steps.
pub struct Chain<T> {
    steps: Vec<StepFn<T>>,
    cancellation: Option<CancellationSignal>,
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            cancellation: None,
        }
    }
}

impl<T: Send + 'static> Chain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. It is called with the previous value and its index.
    pub fn step<F, Fut>(mut self, step: F) -> Self
    where
        F: Fn(T, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.steps
            .push(Arc::new(move |value: T, index: usize| step(value, index).boxed()));
        self
    }

    /// Append `count` copies of the same step. Each copy sees its own index.
    pub fn repeat<F, Fut>(mut self, count: usize, step: F) -> Self
    where
        F: Fn(T, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let step: StepFn<T> = Arc::new(move |value: T, index: usize| step(value, index).boxed());
        self.steps.extend(std::iter::repeat_n(step, count));
        self
    }

    /// Checkpoint `signal` before every step and once after the last.
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = Some(signal);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Drive every step in order starting from `initial`.
    ///
    /// The first failing step ends the chain and its error is returned as is.
    /// The chain can be run any number of times.
    pub async fn run(&self, initial: T) -> Result<T> {
        let started = Instant::now();
        let mut value = initial;
        for (index, step) in self.steps.iter().enumerate() {
            self.checkpoint()?;
            value = step(value, index)
                .await
                .inspect_err(|e| warn!(index, error = %e, "chain step failed"))?;
            trace!(index, "chain step done");
        }
        self.checkpoint()?;
        debug!(
            steps = self.steps.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "chain completed"
        );
        Ok(value)
    }

    fn checkpoint(&self) -> Result<()> {
        match self.cancellation {
            Some(ref signal) => signal.checkpoint(),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Letter-by-letter uppercasing
// ---------------------------------------------------------------------------

/// Step that uppercases the character at its index after waiting `delay`.
///
/// Non-letters pass through without waiting. The input must still be
/// `expected_len` characters long and the index must be in range, otherwise
/// the step fails with [`Error::InvariantViolated`]. Letters whose uppercase
/// form is more than one character are left alone so the length holds.
pub fn letter_step(
    expected_len: usize,
    delay: Duration,
) -> impl Fn(String, usize) -> StepFuture<String> + Clone + Send + Sync + 'static {
    move |current: String, index: usize| {
        async move {
            let mut chars: Vec<char> = current.chars().collect();
            if chars.len() != expected_len {
                return Err(Error::invariant(format!(
                    "expected {expected_len} characters, got {}",
                    chars.len()
                )));
            }
            let Some(&ch) = chars.get(index) else {
                return Err(Error::invariant(format!(
                    "step index {index} out of range for {expected_len} characters"
                )));
            };
            if !ch.is_alphabetic() {
                return Ok(current);
            }

            time::delay(delay).await;
            let mut upper = ch.to_uppercase();
            if let (Some(single), None) = (upper.next(), upper.next()) {
                chars[index] = single;
            }
            Ok(chars.into_iter().collect())
        }
        .boxed()
    }
}

/// One [`letter_step`] per character of an input `len` characters long.
pub fn uppercase_chain(len: usize, delay: Duration) -> Chain<String> {
    Chain::new().repeat(len, letter_step(len, delay))
}

/// Uppercase every letter of `input`, one letter at a time.
pub async fn uppercase_letters(input: &str, delay: Duration) -> Result<String> {
    uppercase_chain(input.chars().count(), delay)
        .run(input.to_string())
        .await
}
