//! Polling fallback: re-read on a fixed interval and assume the writer is
//! gone after a quiet period without new lines.

use crate::config::{LineFormat, PollOptions};
use crate::coordinator::{DrainGauge, LineSink, Termination, drain_and_emit};
use crate::error::Result;
use crate::reader::LineReader;
use std::path::Path;
use tokio::time::Instant;

pub struct PollingTail {
    reader: LineReader,
    options: PollOptions,
}

impl PollingTail {
    pub async fn open<P: AsRef<Path>>(
        path: P,
        format: &LineFormat,
        options: PollOptions,
    ) -> Result<Self> {
        let reader = LineReader::open_with(path, format).await?;
        Ok(Self { reader, options })
    }

    /// Polls until a read fails or no line arrives for the quiet period.
    pub async fn run(mut self, gauge: &DrainGauge, sink: &LineSink) -> Termination {
        let mut last_line_at = Instant::now();

        let outcome = loop {
            match drain_and_emit(&mut self.reader, gauge, sink).await {
                Ok(0) => {}
                Ok(_) => last_line_at = Instant::now(),
                Err(e) => break Termination::IoFailure(e),
            }

            let idle = last_line_at.elapsed();
            if idle > self.options.quiet_period {
                tracing::info!(
                    idle_ms = idle.as_millis() as u64,
                    "no new lines within quiet period, assuming file closed"
                );
                break Termination::GracefulClose;
            }
            tokio::time::sleep(self.options.interval).await;
        };

        self.reader.close();
        outcome
    }
}
