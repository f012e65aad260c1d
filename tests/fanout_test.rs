//! Integration tests for fan-out/fan-in.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use taskweave::deferred::Deferred;
use taskweave::fanout::{FailurePolicy, join_all, when_all, when_all_with};
use taskweave::model::OperationState;
use taskweave::workload::fetch_items;
use taskweave::{Error, Result};

async fn explode() -> Result<u8> {
    panic!("worker blew up")
}

async fn after<T>(ms: u64, outcome: Result<T>) -> Result<T> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    outcome
}

#[tokio::test]
async fn fetches_all_items_concurrently() {
    let start = Instant::now();
    let results = fetch_items(&[3, 6, 1, 7, 4, 5, 1], Duration::from_millis(100))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(
        results,
        ["Item-3", "Item-6", "Item-1", "Item-7", "Item-4", "Item-5", "Item-1"]
    );
    assert!(elapsed >= Duration::from_millis(100), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(200), "took {elapsed:?}");
}

#[tokio::test]
async fn results_follow_input_order_not_completion_order() {
    let latencies = [90, 10, 70, 30, 50];
    let start = Instant::now();
    let results = when_all(latencies.map(|ms| after(ms, Ok(ms))))
        .await
        .unwrap();

    assert_eq!(results, latencies);
    // Bounded by the slowest, not the sum (250ms).
    assert!(start.elapsed() >= Duration::from_millis(90));
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn empty_batch_succeeds_immediately() {
    let ops: Vec<std::future::Ready<Result<u8>>> = Vec::new();
    assert_eq!(when_all(ops).await, Ok(vec![]));
}

// ---------------------------------------------------------------------------
// Failure policies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wait_for_all_reports_lowest_index_failure_after_everything_settles() {
    let finished = Arc::new(AtomicUsize::new(0));
    let track = |ms: u64, outcome: Result<u64>| {
        let finished = Arc::clone(&finished);
        async move {
            let r = after(ms, outcome).await;
            finished.fetch_add(1, Ordering::SeqCst);
            r
        }
    };

    let start = Instant::now();
    let result = when_all(vec![
        track(100, Ok(1)),
        track(40, Err(Error::failed("second"))),
        track(10, Err(Error::failed("third"))),
    ])
    .await;

    // "third" fails first in time, but "second" comes first in input order.
    assert_eq!(result, Err(Error::OperationFailed("second".into())));
    assert_eq!(finished.load(Ordering::SeqCst), 3);
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn fail_fast_returns_first_failure_and_aborts_the_rest() {
    let slow_finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&slow_finished);

    let slow: BoxFuture<'static, Result<i32>> = Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        flag.store(true, Ordering::SeqCst);
        Ok(1)
    });
    let failing: BoxFuture<'static, Result<i32>> =
        Box::pin(after(20, Err(Error::failed("early"))));

    let start = Instant::now();
    let result = when_all_with(FailurePolicy::FailFast, vec![slow, failing]).await;
    assert_eq!(result, Err(Error::OperationFailed("early".into())));
    assert!(start.elapsed() < Duration::from_millis(200));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!slow_finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn fail_fast_keeps_input_order_on_success() {
    let results = when_all_with(
        FailurePolicy::FailFast,
        [30, 10, 20].map(|ms| after(ms, Ok(ms))),
    )
    .await
    .unwrap();
    assert_eq!(results, [30, 10, 20]);
}

#[tokio::test]
async fn panicking_operation_surfaces_as_failure() {
    let ops: Vec<BoxFuture<'static, Result<u8>>> =
        vec![Box::pin(after(5, Ok(1))), Box::pin(explode())];
    let result = when_all(ops).await;
    assert!(matches!(result, Err(Error::OperationFailed(_))));
}

// ---------------------------------------------------------------------------
// join_all over spawned handles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_all_collects_already_running_operations() {
    let batch: Vec<Deferred<u64>> = (1..=3)
        .map(|n| Deferred::spawn(after(n * 10, Ok(n))))
        .collect();
    let observers: Vec<_> = batch.iter().map(Deferred::observer).collect();

    assert_eq!(join_all(batch).await, Ok(vec![1, 2, 3]));
    for observer in observers {
        assert_eq!(observer.state(), OperationState::Completed);
    }
}
