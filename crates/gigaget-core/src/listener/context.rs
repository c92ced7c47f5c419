//! Delivery contexts: where listener callbacks run.

use std::sync::mpsc;
use std::thread;

/// Unit of work posted to a context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that runs posted tasks, in posting order, somewhere
/// other than the poster's stack. `post` must not block.
pub trait DeliveryContext: Send + Sync {
    fn post(&self, task: Task);
}

/// Dedicated thread draining a task queue. The thread exits once the
/// `EventLoop` (and every clone of its sender) is dropped.
pub struct EventLoop {
    tx: mpsc::Sender<Task>,
}

impl EventLoop {
    pub fn new(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            for task in rx {
                task();
            }
        })?;
        Ok(Self { tx })
    }
}

impl DeliveryContext for EventLoop {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            tracing::warn!("event loop gone; dropping listener callback");
        }
    }
}

/// Runs tasks on a tokio runtime, one after another, on a single spawned task.
pub struct TokioContext {
    tx: tokio::sync::mpsc::UnboundedSender<Task>,
}

impl TokioContext {
    /// Bind to the runtime behind `handle`.
    pub fn new(handle: &tokio::runtime::Handle) -> Self {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Task>();
        handle.spawn(async move {
            while let Some(task) = rx.recv().await {
                task();
            }
        });
        Self { tx }
    }

    /// Bind to the runtime of the calling task. Panics outside a runtime.
    pub fn current() -> Self {
        Self::new(&tokio::runtime::Handle::current())
    }
}

impl DeliveryContext for TokioContext {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            tracing::warn!("tokio delivery task gone; dropping listener callback");
        }
    }
}
