//! Operation span helpers.
//!
//! Every deferred operation runs inside one of these spans; state changes
//! are recorded as events scoped to it.

use tracing::Span;

use crate::model::{OperationId, OperationState};

/// Start a span for a deferred operation.
///
/// The `operation.state` field is declared empty and is filled in by
/// [`record_state_transition`].
pub fn start_operation_span(kind: &str, id: OperationId) -> Span {
    tracing::info_span!(
        "operation.execute",
        "operation.kind" = kind,
        "operation.id" = %id.0,
        "operation.state" = tracing::field::Empty,
    )
}

/// Record a state transition on the given span.
pub fn record_state_transition(span: &Span, from: OperationState, to: OperationState) {
    span.record("operation.state", tracing::field::display(to));
    span.in_scope(|| {
        tracing::debug!(%from, %to, "state_transition");
    });
}
