//! Metric instrument factories for opqueue.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider every instrument is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for opqueue instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("opqueue")
}

/// Counter: operations added to a queue.
pub fn operations_added() -> Counter<u64> {
    meter()
        .u64_counter("opqueue.operations.added")
        .with_description("Number of operations added")
        .build()
}

/// Counter: operations that completed normally.
/// Labels: `status`.
pub fn operations_completed() -> Counter<u64> {
    meter()
        .u64_counter("opqueue.operations.completed")
        .with_description("Number of operations completed")
        .build()
}

/// Counter: operations resolved as cancelled.
/// Labels: `stage` ("pending" | "active").
pub fn operations_cancelled() -> Counter<u64> {
    meter()
        .u64_counter("opqueue.operations.cancelled")
        .with_description("Number of operations cancelled")
        .build()
}

/// Histogram: time from dispatch to the body returning, in milliseconds.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("opqueue.operation.duration_ms")
        .with_description("Operation body duration in milliseconds")
        .with_unit("ms")
        .build()
}
