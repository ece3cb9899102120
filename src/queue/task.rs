//! Task wrapper: one operation bound to its run-state and cancel request.
//!
//! The cancel request and the run-state share one mutex, so "was cancel
//! requested?" and "may the body start?" are decided together.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::{OperationId, RunState};
use crate::operation::{CancellationToken, Operation};

pub(crate) struct TaskWrapper {
    operation: Arc<dyn Operation>,
    /// Cancellation-observed flag handed to `run`.
    token: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

struct Lifecycle {
    run_state: RunState,
    cancel_requested: bool,
}

impl TaskWrapper {
    pub(crate) fn new(operation: Arc<dyn Operation>) -> Self {
        Self {
            operation,
            token: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle {
                run_state: RunState::NotStarted,
                cancel_requested: false,
            }),
        }
    }

    pub(crate) fn id(&self) -> &OperationId {
        self.operation.id()
    }

    pub(crate) fn operation(&self) -> &Arc<dyn Operation> {
        &self.operation
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[cfg(test)]
    pub(crate) fn run_state(&self) -> RunState {
        self.lock().run_state
    }

    /// Record a cancel request and raise the token.
    ///
    /// Returns false if the task already finished or was already cancelled.
    pub(crate) fn request_cancel(&self) -> bool {
        let mut lifecycle = self.lock();
        if lifecycle.run_state.is_terminal() || lifecycle.cancel_requested {
            return false;
        }
        lifecycle.cancel_requested = true;
        self.token.cancel();
        true
    }

    /// Move to `Running` unless a cancel was requested first.
    ///
    /// Returns whether the body may be invoked.
    pub(crate) fn begin(&self) -> bool {
        let mut lifecycle = self.lock();
        if lifecycle.cancel_requested {
            lifecycle.run_state = RunState::Finished;
            return false;
        }
        debug_assert!(lifecycle.run_state.can_transition_to(RunState::Running));
        lifecycle.run_state = RunState::Running;
        true
    }

    /// Move to `Finished`. Returns whether cancellation had been requested.
    pub(crate) fn finish(&self) -> bool {
        let mut lifecycle = self.lock();
        lifecycle.run_state = RunState::Finished;
        lifecycle.cancel_requested
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;

    struct Noop(OperationId);

    impl Operation for Noop {
        fn id(&self) -> &OperationId {
            &self.0
        }

        fn run(&self, _cancel: &CancellationToken) -> Outcome {
            Outcome::new("OK")
        }

        fn on_complete(&self, _outcome: Outcome) {}
    }

    fn task() -> TaskWrapper {
        TaskWrapper::new(Arc::new(Noop(OperationId::from("t"))))
    }

    #[test]
    fn begin_without_cancel_runs() {
        let task = task();
        assert_eq!(task.run_state(), RunState::NotStarted);
        assert!(task.begin());
        assert_eq!(task.run_state(), RunState::Running);
        assert!(!task.finish());
        assert_eq!(task.run_state(), RunState::Finished);
    }

    #[test]
    fn cancel_before_begin_prevents_run() {
        let task = task();
        assert!(task.request_cancel());
        assert!(task.token().is_cancelled());
        assert!(!task.begin());
        assert_eq!(task.run_state(), RunState::Finished);
        assert!(task.finish());
    }

    #[test]
    fn cancel_while_running_is_reported_at_finish() {
        let task = task();
        assert!(task.begin());
        assert!(task.request_cancel());
        assert!(task.token().is_cancelled());
        assert!(task.finish());
    }

    #[test]
    fn cancel_is_one_shot() {
        let task = task();
        assert!(task.request_cancel());
        assert!(!task.request_cancel());
    }

    #[test]
    fn cancel_after_finish_is_rejected() {
        let task = task();
        assert!(task.begin());
        assert!(!task.finish());
        assert!(!task.request_cancel());
        assert!(!task.token().is_cancelled());
    }
}
