//! Cancellable background tasks driven by a `watch` shutdown signal.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A spawned loop plus the signal that stops it.
///
/// Dropping the handle signals shutdown and aborts the task; call
/// [`BackgroundTask::shutdown`] to let the loop exit on its own and join it.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Spawn `body` on the current tokio runtime. The body must return once
    /// the receiver observes `true`.
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(body(shutdown_rx));
        tracing::debug!(task = name, "Background task started");
        Self {
            name,
            shutdown_tx,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signal shutdown and wait for the loop to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(task = self.name, error = %error, "Background task ended abnormally");
            }
        }
        tracing::debug!(task = self.name, "Background task stopped");
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.shutdown_tx.send(true);
            task.abort();
        }
    }
}

/// True once shutdown was requested or the sender is gone.
pub(crate) fn shutdown_requested(
    changed: Result<(), watch::error::RecvError>,
    shutdown_rx: &watch::Receiver<bool>,
) -> bool {
    changed.is_err() || *shutdown_rx.borrow()
}
