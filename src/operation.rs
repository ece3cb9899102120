//! The operation contract and its cancellation token.
//!
//! An operation's `run` executes on a pool thread. The queue, never the
//! operation itself, invokes `on_complete` or `on_cancel` afterwards through
//! the configured [`Dispatcher`](crate::dispatch::Dispatcher).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::{OperationId, Outcome};

/// A unit of background work.
///
/// `run` should poll `cancel` if it can take a while: cancellation of an
/// operation whose body is already executing is cooperative only.
pub trait Operation: Send + Sync + 'static {
    /// Identifier, unique for the lifetime of the registry it is added to.
    fn id(&self) -> &OperationId;

    /// The long-running body.
    fn run(&self, cancel: &CancellationToken) -> Outcome;

    /// Called with the outcome of `run` when no cancellation was requested.
    fn on_complete(&self, outcome: Outcome);

    /// Called once when the operation is cancelled, whether or not it ran.
    fn on_cancel(&self) {}
}

/// Shared cancellation flag handed to [`Operation::run`].
///
/// All clones observe the same state. Only the queue sets it.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
