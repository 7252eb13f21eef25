//! Stream of line batches produced by a background tail task.

use crate::config::TailOptions;
use crate::coordinator::{TailCoordinator, Termination};
use crate::error::{Error, Result};
use futures::Stream;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A stream that follows a file and yields each batch of newly completed
/// lines. It ends when the tail terminates; [`TailStream::finish`] then
/// reports how.
pub struct TailStream {
    receiver: mpsc::UnboundedReceiver<Vec<String>>,
    task_handle: Option<JoinHandle<Termination>>,
}

impl TailStream {
    /// Validates `options` and starts following `path` on the current tokio
    /// runtime.
    pub fn new<P: AsRef<Path>>(path: P, options: TailOptions) -> Result<Self> {
        options.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = TailCoordinator::new(path, options);
        let task_handle = tokio::spawn(coordinator.run(tx));

        Ok(TailStream {
            receiver: rx,
            task_handle: Some(task_handle),
        })
    }

    /// Waits for the tail to end and returns its outcome. Batches not yet
    /// consumed are discarded.
    pub async fn finish(mut self) -> Termination {
        self.receiver.close();
        match self.task_handle.take() {
            Some(handle) => match handle.await {
                Ok(termination) => termination,
                Err(e) => Termination::IoFailure(Error::Task(e)),
            },
            None => Termination::IoFailure(Error::SubscriptionClosed),
        }
    }

    /// Check if the stream has been closed/dropped
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

impl Drop for TailStream {
    fn drop(&mut self) {
        // Aborting drops the reader and the event source, including one owned
        // by a hand-off subscriber task
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Stream for TailStream {
    type Item = Vec<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}
