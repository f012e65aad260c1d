//! Integration tests for cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use taskweave::Error;
use taskweave::cancel::CancellationSignal;
use taskweave::workload::long_running_operation;

#[test]
fn new_signal_is_inactive() {
    let signal = CancellationSignal::new();
    assert!(!signal.is_requested());
    assert!(signal.checkpoint().is_ok());
}

#[test]
fn request_is_idempotent_and_sticky() {
    let signal = CancellationSignal::new();
    let observer = signal.clone();

    signal.request();
    signal.request();

    assert!(observer.is_requested());
    // Every later observation reports cancellation, not just the first.
    for _ in 0..3 {
        assert_eq!(observer.checkpoint(), Err(Error::Cancelled));
    }
}

#[test]
fn request_from_another_thread_is_observed() {
    let signal = CancellationSignal::new();
    let remote = signal.clone();
    std::thread::spawn(move || remote.request())
        .join()
        .unwrap();
    assert!(signal.is_requested());
}

#[tokio::test]
async fn cancelled_resolves_immediately_when_already_set() {
    let signal = CancellationSignal::new();
    signal.request();
    tokio::time::timeout(Duration::from_millis(100), signal.cancelled())
        .await
        .expect("cancelled() should resolve at once");
}

#[tokio::test]
async fn cancelled_wakes_every_waiter() {
    let signal = CancellationSignal::new();
    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let s = signal.clone();
            tokio::spawn(async move { s.cancelled().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(10)).await;
    signal.request();

    for waiter in waiters {
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}

// ---------------------------------------------------------------------------
// guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn guard_does_not_start_work_when_already_cancelled() {
    let signal = CancellationSignal::new();
    signal.request();

    let started = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&started);
    let result = signal
        .guard(async move {
            flag.store(true, Ordering::SeqCst);
            Ok(1)
        })
        .await;

    assert_eq!(result, Err(Error::Cancelled));
    assert!(!started.load(Ordering::SeqCst));
}

#[tokio::test]
async fn guard_reports_cancellation_requested_during_work() {
    let signal = CancellationSignal::new();
    let inner = signal.clone();
    let result = signal
        .guard(async move {
            inner.request();
            Ok("done")
        })
        .await;
    assert_eq!(result, Err(Error::Cancelled));
}

#[tokio::test]
async fn guard_propagates_operation_failure_unchanged() {
    let signal = CancellationSignal::new();
    let result: taskweave::Result<()> = signal
        .guard(async { Err(Error::failed("boom")) })
        .await;
    assert_eq!(result, Err(Error::OperationFailed("boom".into())));
}

// ---------------------------------------------------------------------------
// Long-running operation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn long_running_operation_completes() {
    let signal = CancellationSignal::new();
    let result = long_running_operation(&signal, Duration::from_millis(50)).await;
    assert_eq!(result.unwrap(), "foo");
}

#[tokio::test]
async fn long_running_operation_respects_cancellation_before_start() {
    let signal = CancellationSignal::new();
    signal.request();

    let start = Instant::now();
    let result = long_running_operation(&signal, Duration::from_secs(5)).await;
    assert_eq!(result, Err(Error::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn long_running_operation_observes_cancellation_during_wait() {
    let signal = CancellationSignal::new();
    let canceller = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.request();
    });

    let result = long_running_operation(&signal, Duration::from_secs(5)).await;
    assert!(result.unwrap_err().is_cancelled());
}
