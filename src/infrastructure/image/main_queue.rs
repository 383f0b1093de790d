//! Single delivery context for fetch completions.
//!
//! Every completion the cache service produces, whichever tier resolved it,
//! is funneled through one task that runs jobs one at a time in submission
//! order. Consumers therefore never race each other.

use std::panic::AssertUnwindSafe;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the delivery queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MainQueue {
    job_tx: mpsc::UnboundedSender<Job>,
}

impl MainQueue {
    /// Spawns the delivery task on the current tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = job_rx.recv().await {
                if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("Completion panicked on main queue");
                }
            }
            debug!("Main queue stopped");
        });

        Self { job_tx }
    }

    /// Schedules `job` to run on the delivery context.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.job_tx.send(Box::new(job)).is_err() {
            warn!("Main queue closed, dropping completion");
        }
    }

    /// Resolves once every job dispatched before this call has run.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.dispatch(move || {
            let _ = done_tx.send(());
        });
        let _ = done_rx.await;
    }
}
