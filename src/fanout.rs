//! Fan-out/fan-in: run independent operations concurrently, collect results
//! in input order.

use std::future::Future;

use futures::StreamExt as _;
use futures::stream::FuturesUnordered;
use tracing::{debug, warn};

use crate::deferred::Deferred;
use crate::error::Result;
use crate::telemetry::metrics;

/// What to do when an operation in a batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Let every operation settle, then report the failure with the lowest
    /// input index. Nothing is left running when the call returns.
    #[default]
    WaitForAll,
    /// Report the first failure to complete and abort the rest.
    FailFast,
}

/// Spawn every operation at once and wait for all of them.
///
/// Results come back in input order regardless of completion order. On
/// failure this follows [`FailurePolicy::WaitForAll`].
pub async fn when_all<I, F, T>(operations: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    when_all_with(FailurePolicy::WaitForAll, operations).await
}

/// [`when_all`] with an explicit failure policy.
pub async fn when_all_with<I, F, T>(policy: FailurePolicy, operations: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let batch: Vec<Deferred<T>> = operations
        .into_iter()
        .map(|op| Deferred::spawn_named("fanout", op))
        .collect();
    join_all_with(policy, batch).await
}

/// Fan-in over operations that are already running. Waits for every one.
pub async fn join_all<T>(batch: Vec<Deferred<T>>) -> Result<Vec<T>> {
    join_all_with(FailurePolicy::WaitForAll, batch).await
}

/// Fan-in over running operations with an explicit failure policy.
pub async fn join_all_with<T>(policy: FailurePolicy, batch: Vec<Deferred<T>>) -> Result<Vec<T>> {
    metrics::fanout_batch_size().record(batch.len() as u64, &[]);
    debug!(size = batch.len(), ?policy, "waiting for batch");
    match policy {
        FailurePolicy::WaitForAll => join_wait_for_all(batch).await,
        FailurePolicy::FailFast => join_fail_fast(batch).await,
    }
}

async fn join_wait_for_all<T>(batch: Vec<Deferred<T>>) -> Result<Vec<T>> {
    let size = batch.len();

    let outcomes = futures::future::join_all(batch).await;

    let mut values = Vec::with_capacity(size);
    let mut first_failure = None;
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(value) => values.push(value),
            Err(e) => {
                warn!(index, error = %e, "operation in batch failed");
                first_failure.get_or_insert(e);
            }
        }
    }

    match first_failure {
        Some(e) => Err(e),
        None => Ok(values),
    }
}

async fn join_fail_fast<T>(batch: Vec<Deferred<T>>) -> Result<Vec<T>> {
    let size = batch.len();

    let aborts: Vec<_> = batch.iter().map(|d| d.abort_handle()).collect();
    let mut pending: FuturesUnordered<_> = batch
        .into_iter()
        .enumerate()
        .map(|(index, op)| async move { (index, op.await) })
        .collect();

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(size).collect();
    while let Some((index, outcome)) = pending.next().await {
        match outcome {
            Ok(value) => slots[index] = Some(value),
            Err(e) => {
                warn!(index, error = %e, "operation in batch failed, aborting the rest");
                for abort in &aborts {
                    abort.abort();
                }
                return Err(e);
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
