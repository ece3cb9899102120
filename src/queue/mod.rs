//! The operation registry and its per-operation wrapper.

pub mod registry;
pub(crate) mod task;

pub use registry::{OperationQueue, QueueOptions};
