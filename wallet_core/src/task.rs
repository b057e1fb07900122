//! Handles for the wallet's background loops.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// A background loop that stops when told to, or when its handle is dropped.
///
/// The loop receives a shutdown receiver and is expected to `select!` on it
/// alongside its own work.
pub struct TaskHandle {
    shutdown: broadcast::Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, rx) = broadcast::channel(1);
        let join = tokio::spawn(run(rx));
        Self {
            shutdown,
            join: Some(join),
        }
    }

    /// Signal the loop to stop without waiting for it.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the loop to stop and wait until it has.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
