//! Operation execution span helpers.
//!
//! Provides span creation and state-transition recording for operations
//! flowing through the queue.

use tracing::Span;

use crate::model::OperationId;

/// Start a span for one operation body.
///
/// The `operation.state` field is declared empty and can be updated via
/// [`record_state_transition`].
pub fn start_operation_span(id: &OperationId) -> Span {
    tracing::info_span!(
        "operation.execute",
        "operation.id" = %id,
        "operation.state" = tracing::field::Empty,
    )
}

/// Record a state transition on the given span.
///
/// Emits a tracing `info` event scoped to the span and updates its
/// `operation.state` field.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.record("operation.state", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
