//! Execution layer: a shared worker pool and the serializer on top of it.

pub mod pool;
pub mod serial;

pub use pool::{Job, TokioPool, WorkerPool};
pub use serial::SerialExecutor;
