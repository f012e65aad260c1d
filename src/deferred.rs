//! Deferred operations: spawned units of async work with tracked state.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::Utc;
use opentelemetry::KeyValue;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, warn};

use crate::error::{Error, Result};
use crate::model::{OperationId, OperationSnapshot, OperationState};
use crate::telemetry::metrics;
use crate::telemetry::operation::{record_state_transition, start_operation_span};

/// Handle to an operation running on the tokio runtime.
///
/// Awaiting the handle yields the operation's result. Dropping it detaches
/// the operation; it keeps running. Use [`abort`](Self::abort) to stop it.
#[must_use = "dropping a Deferred detaches the operation"]
pub struct Deferred<T> {
    tracker: Arc<Tracker>,
    handle: JoinHandle<Result<T>>,
}

/// Shared between the handle and the running task.
struct Tracker {
    kind: &'static str,
    span: Span,
    started: Instant,
    snapshot: Mutex<OperationSnapshot>,
}

impl Tracker {
    fn new(kind: &'static str) -> Self {
        let id = OperationId::new();
        Self {
            kind,
            span: start_operation_span(kind, id),
            started: Instant::now(),
            snapshot: Mutex::new(OperationSnapshot::new(id)),
        }
    }

    fn snapshot(&self) -> OperationSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `to` if legal from the current state. Terminal states stick.
    fn transition(&self, to: OperationState) {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        let from = snapshot.state;
        if !from.can_transition_to(to) {
            return;
        }
        snapshot.state = to;
        if to.is_terminal() {
            snapshot.finished_at = Some(Utc::now());
        }
        drop(snapshot);

        record_state_transition(&self.span, from, to);
        if to.is_terminal() {
            let kind = KeyValue::new("kind", self.kind);
            metrics::operations_finished()
                .add(1, &[kind.clone(), KeyValue::new("state", to.to_string())]);
            metrics::operation_duration_ms()
                .record(self.started.elapsed().as_secs_f64() * 1000.0, &[kind]);
        }
    }
}

/// Moved into the spawned task. If the task is dropped before it settles
/// (aborted, never polled, or unwinding) the state still ends terminal.
struct SettleOnDrop(Arc<Tracker>);

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        let to = if std::thread::panicking() {
            OperationState::Failed
        } else {
            OperationState::Cancelled
        };
        self.0.transition(to);
    }
}

fn settled_state<T>(result: &Result<T>) -> OperationState {
    match result {
        Ok(_) => OperationState::Completed,
        Err(Error::Cancelled) => OperationState::Cancelled,
        Err(_) => OperationState::Failed,
    }
}

impl<T: Send + 'static> Deferred<T> {
    /// Spawn `operation` immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(operation: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self::spawn_named("deferred", operation)
    }

    /// Spawn with a `kind` label used in spans and metrics.
    pub fn spawn_named<F>(kind: &'static str, operation: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let tracker = Arc::new(Tracker::new(kind));
        metrics::operations_started().add(1, &[KeyValue::new("kind", kind)]);

        let guard = SettleOnDrop(Arc::clone(&tracker));
        let span = tracker.span.clone();
        let handle = tokio::spawn(
            async move {
                let guard = guard;
                guard.0.transition(OperationState::Running);
                let result = operation.await;
                guard.0.transition(settled_state(&result));
                result
            }
            .instrument(span),
        );

        Self { tracker, handle }
    }
}

impl<T> Deferred<T> {
    pub fn id(&self) -> OperationId {
        self.tracker.snapshot().id
    }

    pub fn state(&self) -> OperationState {
        self.tracker.snapshot().state
    }

    pub fn snapshot(&self) -> OperationSnapshot {
        self.tracker.snapshot()
    }

    /// True once the underlying task has stopped, whatever the outcome.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the operation at its next suspension point. Awaiting the handle
    /// afterwards yields [`Error::Cancelled`] unless it had already settled.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// A read-only view of this operation's state that outlives the handle.
    pub fn observer(&self) -> Observer {
        Observer {
            tracker: Arc::clone(&self.tracker),
        }
    }

    /// A handle that can abort the operation without owning it.
    pub fn abort_handle(&self) -> tokio::task::AbortHandle {
        self.handle.abort_handle()
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let joined = std::task::ready!(Pin::new(&mut self.handle).poll(cx));
        Poll::Ready(match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                self.tracker.transition(OperationState::Cancelled);
                Err(Error::Cancelled)
            }
            Err(e) => {
                let id = self.tracker.snapshot().id;
                warn!(operation_id = %id, error = %e, "operation panicked");
                self.tracker.transition(OperationState::Failed);
                Err(Error::OperationFailed(format!("operation {id} panicked")))
            }
        })
    }
}

/// State view of a [`Deferred`], usable after the handle is consumed.
#[derive(Clone)]
pub struct Observer {
    tracker: Arc<Tracker>,
}

impl Observer {
    pub fn snapshot(&self) -> OperationSnapshot {
        self.tracker.snapshot()
    }

    pub fn state(&self) -> OperationState {
        self.tracker.snapshot().state
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.tracker.snapshot();
        f.debug_struct("Deferred")
            .field("id", &snapshot.id)
            .field("state", &snapshot.state)
            .finish()
    }
}
