//! Integration tests for the canned operations.

use std::time::{Duration, Instant};

use taskweave::Error;
use taskweave::cancel::CancellationSignal;
use taskweave::deferred::Deferred;
use taskweave::workload::{fetch_item, fetch_user, fetch_user_validated, long_running_operation};

#[tokio::test]
async fn fetch_user_resolves_after_its_delay() {
    let start = Instant::now();
    let user = fetch_user(123, Duration::from_millis(30)).await.unwrap();
    assert_eq!(user, "User123");
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn validated_fetch_rejects_negative_ids_without_waiting() {
    let start = Instant::now();
    let result = fetch_user_validated(-1, Duration::from_secs(5)).await;
    assert_eq!(result, Err(Error::OperationFailed("no negatives".into())));
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn validated_fetch_accepts_zero() {
    let user = fetch_user_validated(0, Duration::ZERO).await.unwrap();
    assert_eq!(user, "User0");
}

#[tokio::test]
async fn failure_is_observed_when_awaited() {
    let op = Deferred::spawn_named("fetch_user", fetch_user_validated(-5, Duration::ZERO));
    let result = op.await;
    assert!(matches!(result, Err(Error::OperationFailed(msg)) if msg == "no negatives"));
}

#[tokio::test]
async fn fetch_item_formats_the_id() {
    assert_eq!(fetch_item(42, Duration::ZERO).await.unwrap(), "Item-42");
}

#[tokio::test]
async fn long_running_operation_runs_in_background() {
    let signal = CancellationSignal::new();
    let task = {
        let signal = signal.clone();
        Deferred::spawn(async move { long_running_operation(&signal, Duration::from_millis(20)).await })
    };
    assert_eq!(task.await.unwrap(), "foo");
}
