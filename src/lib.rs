//! # opqueue
//!
//! Serial operation queue. Callers add operations from any thread; at most
//! one operation body runs at a time, in strict FIFO order, on a shared
//! worker pool. Pending operations can be cancelled, inspected, or counted
//! without blocking on the running one.
//!
//! ```no_run
//! use std::sync::Arc;
//! use opqueue::dispatch::InlineDispatcher;
//! use opqueue::executor::{SerialExecutor, TokioPool};
//! use opqueue::queue::OperationQueue;
//!
//! # fn main() -> opqueue::error::Result<()> {
//! let executor = SerialExecutor::new(Arc::new(TokioPool::current()?));
//! let queue = OperationQueue::new(executor, Arc::new(InlineDispatcher));
//! assert_eq!(queue.count(), 0);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod executor;
pub mod model;
pub mod operation;
pub mod queue;
pub mod telemetry;

pub use model::{OperationId, Outcome, RunState};
pub use operation::{CancellationToken, Operation};
pub use queue::OperationQueue;
