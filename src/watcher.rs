//! File change subscription using the notify crate.

use crate::error::{Error, Result};
use crate::event::{ChangeEvent, Interest};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// A producer of change-event batches for one watched file.
///
/// [`ChangeSubscription`] is the production implementation; the coordinator
/// is generic over this trait so it can also be driven by scripted sources.
pub trait EventSource: Send {
    /// Waits for at least one event, then returns every event available
    /// without further waiting, in delivery order.
    fn next_batch(&mut self) -> impl Future<Output = Result<Vec<ChangeEvent>>> + Send;

    /// Releases the watch. Must be safe to call more than once.
    fn close(&mut self);
}

/// Subscription to change notifications for a single file.
pub struct ChangeSubscription {
    watcher: Option<RecommendedWatcher>,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    file_path: PathBuf,
    interest: Interest,
    /// An error that arrived after events had already been collected for a
    /// batch. Reported by the next call instead.
    deferred: Option<notify::Error>,
}

impl ChangeSubscription {
    /// Starts watching `path`, which must be an existing regular file.
    pub fn open<P: AsRef<Path>>(path: P, interest: Interest) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        if path.is_dir() {
            return Err(Error::InvalidPath {
                message: format!("{} is a directory", path.display()),
            });
        }
        // notify reports absolute, resolved paths
        let file_path = path.canonicalize().map_err(|e| Error::InvalidPath {
            message: format!("cannot resolve {}: {}", path.display(), e),
        })?;

        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&file_path, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %file_path.display(), ?interest, "watching file");

        Ok(Self {
            watcher: Some(watcher),
            receiver: rx,
            file_path,
            interest,
            deferred: None,
        })
    }

    /// Returns every event of interest buffered right now, possibly none.
    pub fn try_next_batch(&mut self) -> Result<Vec<ChangeEvent>> {
        if let Some(e) = self.deferred.take() {
            return Err(e.into());
        }
        let mut batch = Vec::new();
        self.collect_buffered(&mut batch)?;
        if batch.is_empty() && self.watcher.is_none() {
            return Err(Error::SubscriptionClosed);
        }
        Ok(batch)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    pub fn is_closed(&self) -> bool {
        self.watcher.is_none()
    }

    fn push_decoded(&self, event: &Event, batch: &mut Vec<ChangeEvent>) {
        let change = ChangeEvent::decode(event, &self.file_path);
        if change.is_admitted_by(self.interest) {
            batch.push(change);
        } else {
            tracing::trace!(kind = ?change.kind(), "dropping event outside interest");
        }
    }

    /// Drains the channel without waiting. Events decoded before an error
    /// are kept; the error is deferred to the next call.
    fn collect_buffered(&mut self, batch: &mut Vec<ChangeEvent>) -> Result<()> {
        while let Ok(res) = self.receiver.try_recv() {
            match res {
                Ok(event) => self.push_decoded(&event, batch),
                Err(e) if batch.is_empty() => return Err(e.into()),
                Err(e) => {
                    self.deferred = Some(e);
                    break;
                }
            }
        }
        Ok(())
    }
}

impl EventSource for ChangeSubscription {
    async fn next_batch(&mut self) -> Result<Vec<ChangeEvent>> {
        if let Some(e) = self.deferred.take() {
            return Err(e.into());
        }
        // The watcher's event thread may outlive `close`; don't wait on it.
        if self.watcher.is_none() {
            return self.try_next_batch();
        }

        let mut batch = Vec::new();
        while batch.is_empty() {
            let event = self
                .receiver
                .recv()
                .await
                .ok_or(Error::SubscriptionClosed)??;
            self.push_decoded(&event, &mut batch);
            self.collect_buffered(&mut batch)?;
        }
        Ok(batch)
    }

    fn close(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.file_path) {
                tracing::debug!(error = %e, "unwatch failed while closing subscription");
            }
            tracing::debug!(path = %self.file_path.display(), "closed subscription");
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.close();
    }
}
