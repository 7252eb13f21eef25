//! Follow an append-only file while a writer extends it, emitting every
//! complete line exactly once, and stop when the writer closes the file.
//!
//! A [`TailCoordinator`] owns a [`LineReader`] and a change subscription. It
//! drains whatever the file already holds, then reacts to change events:
//! `Modified` drains new lines, `Closed` drains one last time and ends the
//! tail gracefully, and an `Opened` event while watching ends it as an
//! anomaly.
//!
//! # Example
//!
//! ```rust,no_run
//! use tailsync::{TailOptions, TailStream};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut stream = TailStream::new("app.log", TailOptions::default())?;
//!
//!     while let Some(lines) = stream.next().await {
//!         for line in lines {
//!             println!("{}", line);
//!         }
//!     }
//!
//!     let termination = stream.finish().await;
//!     std::process::exit(termination.exit_code());
//! }
//! ```

mod config;
mod coordinator;
mod error;
mod event;
mod polling;
mod reader;
mod stream;
mod watcher;

#[cfg(test)]
mod test_helpers;

pub use config::{LineFormat, PollOptions, Strategy, TailOptions};
pub use coordinator::{DrainGauge, LineSink, TailCoordinator, Termination};
pub use error::{Error, Result};
pub use event::{ChangeEvent, ChangeKind, EventMask, Interest};
pub use polling::PollingTail;
pub use reader::{EndOfStream, LineReader, ReadSession};
pub use stream::TailStream;
pub use watcher::{ChangeSubscription, EventSource};

use std::path::Path;

/// Creates a stream that follows `path` with the given options.
///
/// # Example
///
/// ```rust,no_run
/// use tailsync::{follow, Strategy, TailOptions};
/// use tokio_stream::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let options = TailOptions::default().with_strategy(Strategy::Handoff);
///     let mut stream = follow("app.log", options)?;
///
///     while let Some(lines) = stream.next().await {
///         println!("{} new lines", lines.len());
///     }
///
///     Ok(())
/// }
/// ```
pub fn follow<P: AsRef<Path>>(path: P, options: TailOptions) -> Result<TailStream> {
    TailStream::new(path, options)
}
