//! Bounded background queue for fire-and-forget side effects.
//!
//! Submissions never block the caller: a full or closed queue is logged and
//! reported back, and the job is dropped. One worker task drains the channel
//! and runs up to `concurrency` handlers at a time.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Reason a job could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("background queue is full")]
    Full,
    #[error("background queue is closed")]
    Closed,
}

pub struct BackgroundQueue<T> {
    name: &'static str,
    sender: mpsc::Sender<T>,
}

impl<T> Clone for BackgroundQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}

impl<T: Send + 'static> BackgroundQueue<T> {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn<F, Fut>(
        name: &'static str,
        capacity: usize,
        concurrency: usize,
        handler: F,
    ) -> (Self, JoinHandle<()>)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<T>(capacity.max(1));
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let handler = Arc::new(handler);

        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let permit = match Arc::clone(&permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler(job).await;
                    drop(permit);
                });
            }
            debug!(queue = name, "background queue drained");
        });

        (Self { name, sender }, worker)
    }

    pub fn submit(&self, job: T) -> Result<(), QueueError> {
        self.sender.try_send(job).map_err(|err| {
            let error = match err {
                TrySendError::Full(_) => QueueError::Full,
                TrySendError::Closed(_) => QueueError::Closed,
            };
            warn!(queue = self.name, %error, "dropping background job");
            error
        })
    }
}
