//! The tail state machine: drains a [`LineReader`] in response to change
//! events until the writer closes the file.
//!
//! Two scheduling models share the same event handling. In the blocking
//! model one task alternates between waiting for a batch and draining. In
//! the hand-off model the event source runs in its own task and passes one
//! event at a time over a channel of capacity one; it does not fetch the
//! next event until the reading side acknowledges the current one, so drains
//! never overlap.

use crate::config::{PollOptions, Strategy, TailOptions};
use crate::error::{Error, Result};
use crate::event::{ChangeEvent, ChangeKind};
use crate::polling::PollingTail;
use crate::reader::{EndOfStream, LineReader};
use crate::watcher::{ChangeSubscription, EventSource};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};

/// Where emitted line batches are sent.
pub type LineSink = mpsc::UnboundedSender<Vec<String>>;

/// How a tail ended.
#[derive(Debug)]
pub enum Termination {
    /// The writer closed the file; everything it wrote was emitted.
    GracefulClose,
    /// The file was opened again while being watched.
    AnomalousOpen,
    /// Reading, watching, or setup failed.
    IoFailure(Error),
}

impl Termination {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Termination::GracefulClose => 0,
            Termination::AnomalousOpen => 2,
            Termination::IoFailure(_) => 1,
        }
    }

    pub fn is_graceful(&self) -> bool {
        matches!(self, Termination::GracefulClose)
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Termination::IoFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::GracefulClose => write!(f, "writer closed the file"),
            Termination::AnomalousOpen => write!(f, "file was reopened while watched"),
            Termination::IoFailure(e) => write!(f, "tail failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Draining,
    Watching,
    Terminating,
}

/// Counts drains in progress and remembers the highest concurrency seen.
#[derive(Debug, Default)]
pub struct DrainGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl DrainGauge {
    fn enter(&self) -> DrainPermit<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        DrainPermit(self)
    }

    /// Drains running right now.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Most drains ever observed running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Drains started so far.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

struct DrainPermit<'a>(&'a DrainGauge);

impl Drop for DrainPermit<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drains every available line, clears a soft end-of-stream, and forwards
/// the batch to `sink`. Returns the number of lines emitted.
pub(crate) async fn drain_and_emit(
    reader: &mut LineReader,
    gauge: &DrainGauge,
    sink: &LineSink,
) -> Result<usize> {
    let lines = {
        let _permit = gauge.enter();
        reader.drain().await?
    };
    if reader.end_of_stream() == Some(EndOfStream::Soft) {
        reader.reset_soft_eof();
    }

    let count = lines.len();
    if count > 0 {
        // A dropped receiver only means nobody is listening any more
        let _ = sink.send(lines);
    }
    // Lines completed before a read failure go out before the failure does
    match reader.take_failure() {
        Some(e) => Err(e),
        None => Ok(count),
    }
}

/// Aborts the hand-off subscriber task when dropped, so the event source it
/// owns is released even if the coordinator itself is cancelled.
struct SubscriberGuard(Option<JoinHandle<Result<()>>>);

impl SubscriberGuard {
    /// Waits for the task while still aborting it if this future is dropped.
    async fn join(mut self) -> std::result::Result<Result<()>, JoinError> {
        let result = match self.0.as_mut() {
            Some(handle) => handle.await,
            None => Ok(Ok(())),
        };
        self.0 = None;
        result
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

enum Step {
    Continue,
    Stop(Termination),
}

enum Ack {
    Continue,
    Stop,
}

struct Handoff {
    event: ChangeEvent,
    ack: oneshot::Sender<Ack>,
}

/// Follows one file from its start until a terminal event.
pub struct TailCoordinator {
    path: PathBuf,
    options: TailOptions,
    phase: Phase,
    gauge: Arc<DrainGauge>,
}

impl TailCoordinator {
    pub fn new<P: AsRef<Path>>(path: P, options: TailOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options,
            phase: Phase::Draining,
            gauge: Arc::new(DrainGauge::default()),
        }
    }

    /// Shared handle to the drain counter, usable after `run` consumed the
    /// coordinator.
    pub fn drain_gauge(&self) -> Arc<DrainGauge> {
        Arc::clone(&self.gauge)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs the configured strategy against the real file system.
    pub async fn run(self, sink: LineSink) -> Termination {
        match self.options.strategy {
            Strategy::Polling(poll) => self.run_polling(poll, sink).await,
            Strategy::Blocking | Strategy::Handoff => {
                let interest = self.options.interest;
                self.run_with(|path| ChangeSubscription::open(path, interest), sink)
                    .await
            }
        }
    }

    /// Runs with an event source built by `open_source` once the initial
    /// drain is done. A polling strategy is treated as blocking here.
    pub async fn run_with<S, F>(mut self, open_source: F, sink: LineSink) -> Termination
    where
        S: EventSource + 'static,
        F: FnOnce(&Path) -> Result<S>,
    {
        if let Err(e) = self.options.validate() {
            return self.terminate(Termination::IoFailure(e));
        }

        let mut reader = match LineReader::open_with(&self.path, &self.options.format).await {
            Ok(reader) => reader,
            Err(e) => return self.terminate(Termination::IoFailure(e)),
        };
        if let Err(e) = drain_and_emit(&mut reader, &self.gauge, &sink).await {
            reader.close();
            return self.terminate(Termination::IoFailure(e));
        }

        let mut source = match open_source(&self.path) {
            Ok(source) => source,
            Err(e) => {
                reader.close();
                return self.terminate(Termination::IoFailure(e));
            }
        };
        // Lines written between the first drain and the watch taking effect
        // produce no event of their own.
        if let Err(e) = drain_and_emit(&mut reader, &self.gauge, &sink).await {
            source.close();
            reader.close();
            return self.terminate(Termination::IoFailure(e));
        }

        self.enter(Phase::Watching);
        let outcome = match self.options.strategy {
            Strategy::Handoff => self.watch_handoff(reader, source, &sink).await,
            Strategy::Blocking | Strategy::Polling(_) => {
                self.watch_blocking(reader, source, &sink).await
            }
        };
        self.terminate(outcome)
    }

    async fn run_polling(mut self, poll: PollOptions, sink: LineSink) -> Termination {
        if let Err(e) = self.options.validate() {
            return self.terminate(Termination::IoFailure(e));
        }
        let tail = match PollingTail::open(&self.path, &self.options.format, poll).await {
            Ok(tail) => tail,
            Err(e) => return self.terminate(Termination::IoFailure(e)),
        };
        self.enter(Phase::Watching);
        let outcome = tail.run(&self.gauge, &sink).await;
        self.terminate(outcome)
    }

    async fn watch_blocking<S: EventSource>(
        &self,
        mut reader: LineReader,
        mut source: S,
        sink: &LineSink,
    ) -> Termination {
        let outcome = 'watch: loop {
            let batch = match source.next_batch().await {
                Ok(batch) => batch,
                Err(e) => break Termination::IoFailure(e),
            };

            let mut events = batch.iter();
            while let Some(event) = events.next() {
                if let Step::Stop(outcome) = self.handle_event(&mut reader, event, sink).await {
                    if events.len() > 0 {
                        tracing::debug!(discarded = events.len(), "discarding events after termination");
                    }
                    break 'watch outcome;
                }
            }
        };

        source.close();
        reader.close();
        outcome
    }

    async fn watch_handoff<S: EventSource + 'static>(
        &self,
        mut reader: LineReader,
        source: S,
        sink: &LineSink,
    ) -> Termination {
        let (tx, mut rx) = mpsc::channel::<Handoff>(1);
        let subscriber = SubscriberGuard(Some(tokio::spawn(subscriber_task(source, tx))));

        let outcome = loop {
            let Some(Handoff { event, ack }) = rx.recv().await else {
                break None;
            };
            match self.handle_event(&mut reader, &event, sink).await {
                Step::Continue => {
                    let _ = ack.send(Ack::Continue);
                }
                Step::Stop(outcome) => {
                    let _ = ack.send(Ack::Stop);
                    break Some(outcome);
                }
            }
        };
        drop(rx);
        reader.close();

        match (outcome, subscriber.join().await) {
            (Some(outcome), Ok(_)) => outcome,
            (Some(outcome), Err(e)) => {
                tracing::warn!(error = %e, "subscriber task did not finish cleanly");
                outcome
            }
            (None, Ok(Err(e))) => Termination::IoFailure(e),
            (None, Ok(Ok(()))) => Termination::IoFailure(Error::SubscriptionClosed),
            (None, Err(e)) => Termination::IoFailure(Error::Task(e)),
        }
    }

    async fn handle_event(
        &self,
        reader: &mut LineReader,
        event: &ChangeEvent,
        sink: &LineSink,
    ) -> Step {
        match event.kind() {
            ChangeKind::Modified => match drain_and_emit(reader, &self.gauge, sink).await {
                Ok(_) => Step::Continue,
                Err(e) => Step::Stop(Termination::IoFailure(e)),
            },
            ChangeKind::Closed => match drain_and_emit(reader, &self.gauge, sink).await {
                Ok(_) => Step::Stop(Termination::GracefulClose),
                Err(e) => Step::Stop(Termination::IoFailure(e)),
            },
            ChangeKind::Opened => {
                tracing::warn!(
                    path = %self.path.display(),
                    cursor = reader.session().cursor,
                    "file opened while already being watched"
                );
                Step::Stop(Termination::AnomalousOpen)
            }
            ChangeKind::DirectoryEvent => {
                tracing::info!(
                    name = event.name().unwrap_or(""),
                    is_directory = event.is_directory(),
                    "ignoring directory event"
                );
                Step::Continue
            }
            ChangeKind::Other => {
                tracing::debug!(mask = ?event.mask(), "ignoring event");
                Step::Continue
            }
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "tail phase change");
        self.phase = phase;
    }

    fn terminate(&mut self, outcome: Termination) -> Termination {
        self.enter(Phase::Terminating);
        match &outcome {
            Termination::GracefulClose => {
                tracing::info!(path = %self.path.display(), "writer closed file")
            }
            Termination::AnomalousOpen => {
                tracing::warn!(path = %self.path.display(), "stopped on unexpected open")
            }
            Termination::IoFailure(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "tail failed")
            }
        }
        outcome
    }
}

/// Owns the event source for the hand-off model. Fetches a batch, then
/// passes its events one at a time, waiting for each acknowledgement.
async fn subscriber_task<S: EventSource>(mut source: S, handoff: mpsc::Sender<Handoff>) -> Result<()> {
    let result = forward_events(&mut source, &handoff).await;
    source.close();
    result
}

async fn forward_events<S: EventSource>(
    source: &mut S,
    handoff: &mpsc::Sender<Handoff>,
) -> Result<()> {
    loop {
        let batch = source.next_batch().await?;
        for event in batch {
            let (ack_tx, ack_rx) = oneshot::channel();
            if handoff.send(Handoff { event, ack: ack_tx }).await.is_err() {
                return Ok(());
            }
            match ack_rx.await {
                Ok(Ack::Continue) => {}
                Ok(Ack::Stop) | Err(_) => return Ok(()),
            }
        }
    }
}
