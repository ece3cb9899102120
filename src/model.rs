//! Core data model.
//!
//! An operation is identified by an opaque string, moves through a small
//! run-state machine while it is tracked, and produces an [`Outcome`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Operation ID
// ---------------------------------------------------------------------------

/// Newtype for operation identifiers.
///
/// Callers may supply their own identifier; [`OperationId::new`] generates a
/// random one. Uniqueness within a registry is a caller contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OperationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for OperationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of an operation's `run`, handed to `on_complete`.
///
/// Immutable once constructed. Failures are encoded by the caller as a
/// failure status; the queue does not interpret the status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    status: String,
    /// Arbitrary result data. Opaque to the queue.
    data: Option<serde_json::Value>,
}

impl Outcome {
    /// Status carried by [`Outcome::not_found`].
    pub const NOT_FOUND: &'static str = "Operation Not Found!";

    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            data: None,
        }
    }

    pub fn with_data(status: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: status.into(),
            data: Some(data),
        }
    }

    /// Sentinel for an operation the registry no longer tracks.
    pub fn not_found() -> Self {
        Self::new(Self::NOT_FOUND)
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Self::NOT_FOUND
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Execution state of a tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Pending, or promoted but not yet handed its body.
    NotStarted,
    /// `run` is executing on a pool thread.
    Running,
    /// Terminal. Either completed or cancelled.
    Finished,
}

impl RunState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, to),
            (NotStarted, Running) | (NotStarted, Finished) | (Running, Finished)
        )
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Finished)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::NotStarted => "not_started",
            RunState::Running => "running",
            RunState::Finished => "finished",
        };
        write!(f, "{s}")
    }
}
