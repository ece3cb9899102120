//! Delivery of `on_complete` / `on_cancel` to the operation's owning context.
//!
//! The queue only needs "invoke this callback on the designated context".
//! [`InlineDispatcher`] runs it on the resolving worker thread;
//! [`ChannelDispatcher`] hands it to a [`CallbackLoop`] drained by the owner,
//! the way a UI thread would drain its message loop.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::mpsc;
use tracing::{error, warn};

/// A zero-argument callback bound for the owning context.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    /// Arrange for `callback` to run on the owning context. Must not block.
    fn dispatch(&self, callback: Callback);
}

/// Runs callbacks immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, callback: Callback) {
        run_contained(callback);
    }
}

/// Sends callbacks to a [`CallbackLoop`].
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<Callback>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, CallbackLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, CallbackLoop { rx })
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, callback: Callback) {
        if self.tx.send(callback).is_err() {
            warn!("callback loop closed, dropping callback");
        }
    }
}

/// Receiving end of a [`ChannelDispatcher`]. Callbacks run one at a time.
#[derive(Debug)]
pub struct CallbackLoop {
    rx: mpsc::UnboundedReceiver<Callback>,
}

impl CallbackLoop {
    /// Run every callback already queued, returning how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            run_contained(callback);
            ran += 1;
        }
        ran
    }

    /// Run callbacks as they arrive until every dispatcher is dropped.
    pub async fn run(mut self) {
        while let Some(callback) = self.rx.recv().await {
            run_contained(callback);
        }
    }
}

fn run_contained(callback: Callback) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(callback)) {
        error!(panic = %panic_message(panic.as_ref()), "callback panicked");
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
