//! Worker pool contract and the tokio-backed implementation.

use tokio::runtime::Handle;

use crate::error::{Error, Result};

/// A unit of work handed to a pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Unordered, multi-threaded executor owned by the runtime.
///
/// `execute` must not block the submitting thread. No ordering is implied
/// between jobs.
pub trait WorkerPool: Send + Sync {
    fn execute(&self, job: Job);
}

/// Runs jobs on tokio's blocking thread pool.
#[derive(Debug, Clone)]
pub struct TokioPool {
    handle: Handle,
}

impl TokioPool {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when called outside a tokio runtime.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("no tokio runtime for worker pool: {e}")))?;
        Ok(Self::new(handle))
    }
}

impl WorkerPool for TokioPool {
    fn execute(&self, job: Job) {
        // Detached; completion is observed through the serial chain.
        drop(self.handle.spawn_blocking(job));
    }
}
