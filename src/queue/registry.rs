//! Operation registry: the pending FIFO plus the single active slot.
//!
//! Handoff between the two serialization layers:
//! promote (under the registry lock) -> submit to the [`SerialExecutor`] ->
//! body returns -> callback dispatched -> retire and promote the next.
//! The registry decides *which* operation is active; the executor
//! guarantees no two bodies ever overlap. The two locks are never held
//! together.
//!
//! Events describing a registry change are emitted while the registry lock
//! is held, so their `seq` order matches the order of the changes.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use opentelemetry::KeyValue;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use super::task::TaskWrapper;
use crate::dispatch::{Dispatcher, panic_message};
use crate::event::{CancelStage, EventKind, QueueEvent};
use crate::executor::SerialExecutor;
use crate::model::{OperationId, Outcome};
use crate::operation::Operation;
use crate::telemetry::metrics;
use crate::telemetry::operation::{record_state_transition, start_operation_span};

/// Tunables for an [`OperationQueue`].
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Buffer size of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            event_capacity: 256,
        }
    }
}

/// Serial operation queue. Clones share the same registry.
///
/// Every method is safe to call from any thread and returns without
/// waiting on an operation body.
#[derive(Clone)]
pub struct OperationQueue {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<QueueState>,
    executor: SerialExecutor,
    dispatcher: Arc<dyn Dispatcher>,
    events: broadcast::Sender<QueueEvent>,
    /// Last sequence number; held while sending so `seq` order is send order.
    seq: Mutex<u64>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Arc<TaskWrapper>>,
    active: Option<Arc<TaskWrapper>>,
}

impl QueueState {
    /// Pop the FIFO head into the active slot. `None` leaves the queue idle.
    fn promote_next(&mut self) -> Option<Arc<TaskWrapper>> {
        self.active = self.pending.pop_front();
        self.active.clone()
    }

    fn find_pending(&self, id: &str) -> Option<usize> {
        self.pending.iter().position(|t| t.id().as_str() == id)
    }

    fn is_active(&self, task: &Arc<TaskWrapper>) -> bool {
        self.active.as_ref().is_some_and(|a| Arc::ptr_eq(a, task))
    }
}

impl OperationQueue {
    pub fn new(executor: SerialExecutor, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self::with_options(executor, dispatcher, QueueOptions::default())
    }

    pub fn with_options(
        executor: SerialExecutor,
        dispatcher: Arc<dyn Dispatcher>,
        options: QueueOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                executor,
                dispatcher,
                events,
                seq: Mutex::new(0),
            }),
        }
    }

    /// Reset to empty.
    ///
    /// Pending operations are dropped and receive `on_cancel`; none of them
    /// will ever run. The active operation gets a cancel request and the slot
    /// is cleared without waiting for its body to return.
    pub fn initialize(&self) {
        let (drained, active) = {
            let mut state = self.shared.lock();
            let drained: Vec<_> = state.pending.drain(..).collect();
            let active = state.active.take();
            let dropped = drained.len() + usize::from(active.is_some());
            info!(dropped, "operation queue reset");
            self.shared.emit(EventKind::QueueReset { dropped });
            for task in &drained {
                task.request_cancel();
                task.finish();
                self.shared.report_cancelled(task, CancelStage::Pending);
            }
            (drained, active)
        };

        if let Some(active) = &active {
            if active.request_cancel() {
                debug!(id = %active.id(), "active operation detached by reset");
            } else {
                // Body already returned, or a cancel was already requested;
                // its terminal event comes from the executor.
                debug!(id = %active.id(), "active operation detached by reset, already resolving");
            }
        }
        for task in &drained {
            self.shared.dispatch_cancel(task);
        }
    }

    /// Append `operation` to the FIFO, starting it if the queue is idle.
    pub fn add(&self, operation: Arc<dyn Operation>) {
        let task = Arc::new(TaskWrapper::new(operation));
        let id = task.id().clone();

        let promoted = {
            let mut state = self.shared.lock();
            state.pending.push_back(task);
            let promoted = if state.active.is_none() {
                state.promote_next()
            } else {
                None
            };
            let pending = state.pending.len();
            debug!(%id, pending, "operation added");
            self.shared.emit(EventKind::OperationAdded { id, pending });
            if let Some(next) = &promoted {
                self.shared.announce_promotion(next);
            }
            promoted
        };
        metrics::operations_added().add(1, &[]);

        if let Some(next) = promoted {
            self.shared.submit(next);
        }
    }

    /// Cancel by identifier. Returns false if it is unknown or already
    /// finished, or if it was already cancelled.
    ///
    /// A pending operation is removed at once and never runs. An active one
    /// only has its token raised; a body that is already executing must
    /// observe it, and its result is then discarded in favour of `on_cancel`.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.shared.lock();
            if let Some(active) = state.active.as_ref().filter(|t| t.id().as_str() == id) {
                let accepted = active.request_cancel();
                if accepted {
                    debug!(id, "cancel requested for active operation");
                }
                return accepted;
            }
            let removed = state
                .find_pending(id)
                .and_then(|index| state.pending.remove(index));
            if let Some(task) = &removed {
                task.request_cancel();
                task.finish();
                self.shared.report_cancelled(task, CancelStage::Pending);
            }
            removed
        };

        let Some(task) = removed else {
            debug!(id, "cancel for unknown operation");
            return false;
        };
        self.shared.dispatch_cancel(&task);
        true
    }

    /// Pending plus active.
    pub fn count(&self) -> usize {
        let state = self.shared.lock();
        state.pending.len() + usize::from(state.active.is_some())
    }

    /// Pending only.
    pub fn count_pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Look up an active or pending operation.
    pub fn get_operation(&self, id: &str) -> Option<Arc<dyn Operation>> {
        let state = self.shared.lock();
        state
            .active
            .iter()
            .chain(state.pending.iter())
            .find(|t| t.id().as_str() == id)
            .map(|t| Arc::clone(t.operation()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_operation(id).is_some()
    }

    pub fn active_id(&self) -> Option<OperationId> {
        self.shared.lock().active.as_ref().map(|t| t.id().clone())
    }

    /// Pending identifiers in processing order.
    pub fn pending_ids(&self) -> Vec<OperationId> {
        self.shared
            .lock()
            .pending
            .iter()
            .map(|t| t.id().clone())
            .collect()
    }

    /// Subscribe to queue events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }
}

impl std::fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("OperationQueue")
            .field("active", &state.active.as_ref().map(|t| t.id().clone()))
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: EventKind) {
        let mut seq = self.seq.lock().unwrap_or_else(PoisonError::into_inner);
        *seq += 1;
        let event = QueueEvent {
            seq: *seq,
            timestamp: Utc::now(),
            kind,
        };
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Report a promotion. Called with the registry lock held.
    fn announce_promotion(&self, task: &TaskWrapper) {
        debug!(id = %task.id(), "operation promoted");
        self.emit(EventKind::OperationPromoted {
            id: task.id().clone(),
        });
    }

    /// Hand a freshly promoted task to the execution layer.
    fn submit(self: &Arc<Self>, task: Arc<TaskWrapper>) {
        let shared = Arc::clone(self);
        self.executor.submit(move || shared.execute(task));
    }

    /// Body run by the serial executor for one task.
    fn execute(self: &Arc<Self>, task: Arc<TaskWrapper>) {
        let span = start_operation_span(task.id());
        let _entered = span.enter();
        let started = Instant::now();
        let ran = task.begin();

        let outcome = if ran {
            record_state_transition(&span, "active", "running");
            self.emit(EventKind::OperationStarted {
                id: task.id().clone(),
            });
            let operation = Arc::clone(task.operation());
            let token = task.token().clone();
            match catch_unwind(AssertUnwindSafe(|| operation.run(&token))) {
                Ok(outcome) => Some(outcome),
                Err(panic) => {
                    error!(
                        id = %task.id(),
                        panic = %panic_message(panic.as_ref()),
                        "operation body panicked"
                    );
                    None
                }
            }
        } else {
            None
        };

        let cancelled = task.finish();
        let duration_ms = started.elapsed().as_millis() as u64;
        metrics::operation_duration_ms().record(duration_ms as f64, &[]);

        let outcome = outcome.filter(|_| !cancelled);
        record_state_transition(
            &span,
            if ran { "running" } else { "active" },
            if outcome.is_some() { "completed" } else { "cancelled" },
        );
        self.resolve(&task, outcome, duration_ms);
        self.retire(&task);
    }

    /// Dispatch the terminal callback for a task that left the active slot.
    ///
    /// `Some` routes to `on_complete`; `None` routes to `on_cancel`.
    fn resolve(&self, task: &Arc<TaskWrapper>, outcome: Option<Outcome>, duration_ms: u64) {
        match outcome {
            Some(outcome) => {
                let id = task.id().clone();
                let operation = Arc::clone(task.operation());
                info!(%id, status = outcome.status(), duration_ms, "operation completed");
                metrics::operations_completed()
                    .add(1, &[KeyValue::new("status", outcome.status().to_string())]);
                self.emit(EventKind::OperationCompleted {
                    id,
                    status: outcome.status().to_string(),
                    duration_ms,
                });
                self.dispatcher
                    .dispatch(Box::new(move || operation.on_complete(outcome)));
            }
            None => {
                self.report_cancelled(task, CancelStage::Active);
                self.dispatch_cancel(task);
            }
        }
    }

    /// Log, count, and emit a cancellation. Pending removals call this with
    /// the registry lock held.
    fn report_cancelled(&self, task: &TaskWrapper, stage: CancelStage) {
        let stage_label = match stage {
            CancelStage::Pending => "pending",
            CancelStage::Active => "active",
        };
        info!(id = %task.id(), stage = stage_label, "operation cancelled");
        metrics::operations_cancelled().add(1, &[KeyValue::new("stage", stage_label)]);
        self.emit(EventKind::OperationCancelled {
            id: task.id().clone(),
            stage,
        });
    }

    /// Raise the token and hand `on_cancel` to the dispatcher.
    fn dispatch_cancel(&self, task: &TaskWrapper) {
        task.token().cancel();
        let operation = Arc::clone(task.operation());
        self.dispatcher.dispatch(Box::new(move || operation.on_cancel()));
    }

    /// Drop `task` from the active slot and promote the next pending one.
    ///
    /// A task detached by `initialize` no longer owns the slot and leaves
    /// it alone.
    fn retire(self: &Arc<Self>, task: &Arc<TaskWrapper>) {
        let next = {
            let mut state = self.lock();
            if !state.is_active(task) {
                debug!(id = %task.id(), "detached operation retired");
                return;
            }
            let next = state.promote_next();
            if let Some(next) = &next {
                self.announce_promotion(next);
            }
            next
        };
        match next {
            Some(next) => self.submit(next),
            None => debug!("operation queue idle"),
        }
    }
}
