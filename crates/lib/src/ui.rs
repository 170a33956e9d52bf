//! UI execution context: a single queue of tasks run by whoever owns the UI.
//!
//! The delivery router posts listener calls and channel publishes here instead of running them on
//! the platform's dispatch thread. `UiLoop::run` drains on a tokio runtime; `UiLoop::drain` runs
//! whatever is pending, once per frame.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Posting side of the UI context. Cheap to clone.
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiTask>,
    wake: Option<Arc<dyn Fn() + Send + Sync>>,
}

/// Owning side of the UI context.
pub struct UiLoop {
    rx: mpsc::UnboundedReceiver<UiTask>,
}

/// Create a connected handle/loop pair.
pub fn ui_context() -> (UiHandle, UiLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiHandle { tx, wake: None }, UiLoop { rx })
}

impl UiHandle {
    /// Call `wake` after every successful post (e.g. to request a repaint).
    pub fn with_wake(mut self, wake: impl Fn() + Send + Sync + 'static) -> Self {
        self.wake = Some(Arc::new(wake));
        self
    }

    /// Queue `task` for the UI context. Returns false when the UI side is gone.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        if self.tx.send(Box::new(task)).is_err() {
            return false;
        }
        if let Some(wake) = &self.wake {
            wake();
        }
        true
    }

    /// Wait until every task posted before this call has run. Returns false when the UI side is
    /// gone. Needs the loop to be running (`UiLoop::run`) or drained by someone else.
    pub async fn flush(&self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if !self.post(move || {
            let _ = done_tx.send(());
        }) {
            return false;
        }
        done_rx.await.is_ok()
    }
}

impl UiLoop {
    /// Run tasks until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            run_task(task);
        }
        log::debug!("ui loop: all handles dropped, stopping");
    }

    /// Run every task queued so far without waiting. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while let Ok(task) = self.rx.try_recv() {
            run_task(task);
            n += 1;
        }
        n
    }
}

fn run_task(task: UiTask) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
        let msg = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("ui task panicked: {}", msg);
    }
}
