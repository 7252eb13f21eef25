//! Error types for the tail coordinator and its components.

use thiserror::Error;

/// The main error type for tailing operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The target file could not be opened.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read failed for a reason other than reaching the current end of file.
    #[error("Read failed at byte {offset}: {source}")]
    HardIo {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// File watching errors from the notify crate.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// A complete line was not valid UTF-8.
    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// File path errors.
    #[error("Invalid file path: {message}")]
    InvalidPath { message: String },

    /// The watched file does not exist.
    #[error("File does not exist: {path}")]
    FileNotFound { path: String },

    /// The notification channel was closed underneath the subscription.
    #[error("Subscription closed")]
    SubscriptionClosed,

    /// The reader was closed or previously failed.
    #[error("Reader closed")]
    ReaderClosed,

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A spawned tailing task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Whether the error means the change subscription could not be
    /// established or maintained.
    pub fn is_subscription(&self) -> bool {
        matches!(
            self,
            Error::Watcher(_)
                | Error::FileNotFound { .. }
                | Error::InvalidPath { .. }
                | Error::SubscriptionClosed
        )
    }

    /// Whether the error came from reading an already-open file.
    pub fn is_hard_io(&self) -> bool {
        matches!(
            self,
            Error::HardIo { .. } | Error::Utf8(_) | Error::ReaderClosed
        )
    }
}

/// A convenient Result type for tailing operations.
pub type Result<T> = std::result::Result<T, Error>;
