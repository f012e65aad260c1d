//! Core data model.
//!
//! A deferred operation is a unit of asynchronous work. It has identity,
//! a lifecycle state, and timestamps for when it was created and settled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Operation identity
// ---------------------------------------------------------------------------

/// Newtype for operation IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a deferred operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    /// Handed to the runtime, not yet polled.
    NotStarted,
    /// Polled at least once, not yet settled.
    Running,
    /// Produced a value. Terminal.
    Completed,
    /// Produced an error other than cancellation. Terminal.
    Failed,
    /// Observed cancellation or was aborted. Terminal.
    Cancelled,
}

impl OperationState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, to),
            (NotStarted, Running)
                | (NotStarted, Cancelled) // aborted before first poll
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Failed | OperationState::Cancelled
        )
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationState::NotStarted => "not_started",
            OperationState::Running => "running",
            OperationState::Completed => "completed",
            OperationState::Failed => "failed",
            OperationState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of a deferred operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub id: OperationId,
    pub state: OperationState,
    pub created_at: DateTime<Utc>,
    /// Set once the operation reaches a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl OperationSnapshot {
    pub fn new(id: OperationId) -> Self {
        Self {
            id,
            state: OperationState::NotStarted,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Wall-clock milliseconds between creation and settlement, if settled.
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| u64::try_from((end - self.created_at).num_milliseconds()).unwrap_or(0))
    }
}
