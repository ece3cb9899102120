//! Structured events emitted by the queue on every transition.
//!
//! Subscribers receive them over a broadcast channel to build progress
//! views or audit logs. A slow subscriber lags; it never blocks the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::OperationId;

/// A structured event emitted by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    /// Monotonic sequence number per queue. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

/// Where an operation was when it was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelStage {
    /// Removed from the FIFO before promotion; `run` never invoked.
    Pending,
    /// Active and never started, or started and returned after the request.
    Active,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    OperationAdded {
        id: OperationId,
        pending: usize,
    },
    OperationPromoted {
        id: OperationId,
    },
    OperationStarted {
        id: OperationId,
    },
    OperationCompleted {
        id: OperationId,
        status: String,
        duration_ms: u64,
    },
    OperationCancelled {
        id: OperationId,
        stage: CancelStage,
    },
    QueueReset {
        dropped: usize,
    },
}
