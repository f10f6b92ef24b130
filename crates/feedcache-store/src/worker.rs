//! Serialized execution context for store access.
//!
//! A [`Worker`] owns one [`StoreHandle`] on a dedicated OS thread and runs
//! submitted tasks against it one at a time, strictly in submission order.
//! It is the only code that ever touches the handle, so SQLite never sees
//! concurrent use of the connection.
//!
//! ```text
//! caller ── submit(task) ──► unbounded FIFO ──► worker thread ──► task(&mut handle)
//!    ▲                                                                   │
//!    └──────────────────────── oneshot reply ◄──────────────────────────┘
//! ```
//!
//! Submission never blocks: the task is queued when [`Worker::submit`] is
//! called, and the returned future only waits for that task's reply.
//! Dropping the future does not cancel the task.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace};

use crate::db::StoreHandle;
use crate::error::{StoreError, StoreResult};

const WORKER_THREAD_NAME: &str = "feedcache-store";

type Job = Box<dyn FnOnce(&mut StoreHandle) + Send + 'static>;

/// Single-consumer task queue bound to one store handle.
pub struct Worker {
    sender: Option<mpsc::UnboundedSender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Move `handle` onto a new worker thread.
    pub fn spawn(handle: StoreHandle) -> StoreResult<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run(handle, receiver))
            .map_err(|e| {
                StoreError::WorkerUnavailable(format!("failed to spawn store worker thread: {e}"))
            })?;

        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Queue `task` and return a future resolving to its result.
    ///
    /// `label` names the task in logs and in the error reported if the task
    /// never replies (it panicked, or the worker is gone).
    pub fn submit<T, F>(
        &self,
        label: &'static str,
        task: F,
    ) -> BoxFuture<'static, StoreResult<T>>
    where
        F: FnOnce(&mut StoreHandle) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |handle| {
            trace!(task = label, "store task started");
            // The caller may have stopped waiting; the task still ran.
            let _ = reply_tx.send(task(handle));
        });

        let queued = self
            .sender
            .as_ref()
            .and_then(|sender| sender.send(job).ok())
            .ok_or_else(|| StoreError::WorkerUnavailable("store worker has stopped".into()));

        async move {
            queued?;
            reply_rx.await.map_err(|_| {
                StoreError::WorkerUnavailable(format!("`{label}` task ended without a result"))
            })?
        }
        .boxed()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain what is queued and exit.
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                error!("store worker thread panicked during shutdown");
            }
        }
    }
}

fn run(mut handle: StoreHandle, mut receiver: mpsc::UnboundedReceiver<Job>) {
    info!(path = %handle.path().display(), "store worker started");

    while let Some(job) = receiver.blocking_recv() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&mut handle)));
        if let Err(payload) = outcome {
            error!(payload = %panic_message(&*payload), "store task panicked");
        }
    }

    debug!(path = %handle.path().display(), "store worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
