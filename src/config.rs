//! Options controlling how a file is followed.

use crate::error::{Error, Result};
use crate::event::Interest;
use std::time::Duration;

/// How raw bytes are split into lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormat {
    /// Line terminator. May be more than one byte.
    pub separator: String,
    /// Drop lines that are empty or whitespace-only.
    pub skip_blank: bool,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            skip_blank: false,
        }
    }
}

/// Thresholds for the polling fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Sleep between two reads.
    pub interval: Duration,
    /// With no new line for this long the writer is assumed to have closed
    /// the file.
    pub quiet_period: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            quiet_period: Duration::from_secs(5),
        }
    }
}

/// Scheduling model used to follow the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// One task alternates between waiting for events and draining.
    #[default]
    Blocking,
    /// The subscription and the reader run as separate tasks exchanging one
    /// event at a time.
    Handoff,
    /// No change notification; re-read on a fixed interval.
    Polling(PollOptions),
}

/// Complete configuration of a tail.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TailOptions {
    pub format: LineFormat,
    pub strategy: Strategy,
    pub interest: Interest,
}

impl TailOptions {
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.format.separator = separator.into();
        self
    }

    pub fn with_skip_blank(mut self, skip_blank: bool) -> Self {
        self.format.skip_blank = skip_blank;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_interest(mut self, interest: Interest) -> Self {
        self.interest = interest;
        self
    }

    /// Rejects settings that cannot produce a working tail.
    pub fn validate(&self) -> Result<()> {
        if self.format.separator.is_empty() {
            return Err(Error::InvalidConfig {
                message: "line separator must not be empty".to_string(),
            });
        }
        if let Strategy::Polling(poll) = self.strategy {
            if poll.interval.is_zero() {
                return Err(Error::InvalidConfig {
                    message: "poll interval must be greater than zero".to_string(),
                });
            }
            if poll.quiet_period < poll.interval {
                return Err(Error::InvalidConfig {
                    message: "quiet period must be at least one poll interval".to_string(),
                });
            }
        }
        Ok(())
    }
}
