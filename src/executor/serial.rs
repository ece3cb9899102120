//! Serial executor: one job at a time, in submission order, on a shared pool.
//!
//! Jobs wait in a local FIFO. Only the head is ever handed to the pool, and
//! each dispatched job pulls its successor when it returns, by any path.
//! That chaining is what keeps execution single-file even though the pool
//! itself runs unrelated work in parallel.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use super::pool::{Job, WorkerPool};
use crate::dispatch::panic_message;

/// Serializes jobs over a [`WorkerPool`]. Clones share the same FIFO.
#[derive(Clone)]
pub struct SerialExecutor {
    inner: Arc<Inner>,
}

struct Inner {
    pool: Arc<dyn WorkerPool>,
    state: Mutex<SerialState>,
}

#[derive(Default)]
struct SerialState {
    /// Submitted, not yet dispatched.
    tasks: VecDeque<Job>,
    /// A job is on the pool (or about to be).
    active: bool,
}

impl SerialState {
    fn take_next(&mut self) -> Option<Job> {
        let next = self.tasks.pop_front();
        self.active = next.is_some();
        next
    }
}

impl SerialExecutor {
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                state: Mutex::new(SerialState::default()),
            }),
        }
    }

    /// Queue `work`. Dispatches immediately if nothing is running.
    pub fn submit<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let ready = {
            let mut state = self.inner.lock();
            state.tasks.push_back(Box::new(work));
            if state.active {
                None
            } else {
                state.take_next()
            }
        };
        if let Some(job) = ready {
            self.inner.dispatch(job);
        }
    }

    /// Jobs waiting behind the running one.
    pub fn queued(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// Whether a job is currently dispatched.
    pub fn is_busy(&self) -> bool {
        self.inner.lock().active
    }
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("SerialExecutor")
            .field("queued", &state.tasks.len())
            .field("active", &state.active)
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SerialState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(self: &Arc<Self>, job: Job) {
        let inner = Arc::clone(self);
        self.pool.execute(Box::new(move || {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
                error!(panic = %panic_message(panic.as_ref()), "serial job panicked");
            }
            let next = inner.lock().take_next();
            match next {
                Some(next) => inner.dispatch(next),
                None => debug!("serial executor idle"),
            }
        }));
    }
}
