//! Test utilities for temporary files and scripted change events.

use crate::error::{Error, Result};
use crate::event::{ChangeEvent, ChangeKind};
use crate::watcher::EventSource;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempLogFile {
    /// Create a new empty temporary log file
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");

        File::create(&path)?;

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file holding exactly `content`
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append(content)?;
        Ok(temp_file)
    }

    /// Append raw text, without adding a line terminator
    pub fn append(&self, content: &str) -> std::io::Result<()> {
        self.append_bytes(content.as_bytes())
    }

    pub fn append_bytes(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(bytes)?;
        file.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One scripted wake-up: optional content the "writer" appends, then the
/// events delivered for it.
pub struct ScriptStep {
    pub append: Option<Vec<u8>>,
    pub events: Vec<ChangeEvent>,
}

impl ScriptStep {
    pub fn write(content: &str, kinds: &[ChangeKind]) -> Self {
        Self::write_bytes(content.as_bytes(), kinds)
    }

    pub fn write_bytes(content: &[u8], kinds: &[ChangeKind]) -> Self {
        Self {
            append: Some(content.to_vec()),
            events: kinds.iter().copied().map(ChangeEvent::new).collect(),
        }
    }

    pub fn events(kinds: &[ChangeKind]) -> Self {
        Self {
            append: None,
            events: kinds.iter().copied().map(ChangeEvent::new).collect(),
        }
    }
}

/// Shared observations about a [`ScriptedSource`], readable after the
/// source has been moved into a coordinator.
#[derive(Clone, Default)]
pub struct ScriptProbe {
    closed: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
    batches_served: Arc<AtomicUsize>,
}

impl ScriptProbe {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// True once the source has been dropped.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Polls until the source is dropped or `timeout` passes.
    pub async fn wait_released(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.is_released() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    pub fn batches_served(&self) -> usize {
        self.batches_served.load(Ordering::SeqCst)
    }
}

/// Event source that replays a fixed script against a real file. When the
/// script runs out it reports the subscription as closed, or waits forever
/// if built with [`ScriptedSource::parked`].
pub struct ScriptedSource {
    path: PathBuf,
    steps: VecDeque<ScriptStep>,
    park_when_done: bool,
    probe: ScriptProbe,
}

impl ScriptedSource {
    pub fn new(path: &Path, steps: Vec<ScriptStep>) -> (Self, ScriptProbe) {
        let probe = ScriptProbe::default();
        let source = Self {
            path: path.to_path_buf(),
            steps: steps.into(),
            park_when_done: false,
            probe: probe.clone(),
        };
        (source, probe)
    }

    /// Like [`ScriptedSource::new`], but once the script is exhausted
    /// `next_batch` never completes, like a watch on an idle file.
    pub fn parked(path: &Path, steps: Vec<ScriptStep>) -> (Self, ScriptProbe) {
        let (mut source, probe) = Self::new(path, steps);
        source.park_when_done = true;
        (source, probe)
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.probe.released.store(true, Ordering::SeqCst);
    }
}

impl EventSource for ScriptedSource {
    async fn next_batch(&mut self) -> Result<Vec<ChangeEvent>> {
        if self.probe.is_closed() {
            return Err(Error::SubscriptionClosed);
        }
        let Some(step) = self.steps.pop_front() else {
            if self.park_when_done {
                std::future::pending::<()>().await;
            }
            return Err(Error::SubscriptionClosed);
        };
        if let Some(content) = step.append {
            let mut file = OpenOptions::new().append(true).open(&self.path)?;
            file.write_all(&content)?;
        }
        self.probe.batches_served.fetch_add(1, Ordering::SeqCst);
        Ok(step.events)
    }

    fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
        assert_eq!(std::fs::read_to_string(temp_file.path()).unwrap(), "");
    }

    #[test]
    fn test_with_content_is_exact() {
        let temp_file = TempLogFile::with_content("a\nb").unwrap();
        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "a\nb");
    }

    #[tokio::test]
    async fn test_scripted_source_appends_then_reports_closed() {
        let temp_file = TempLogFile::new().unwrap();
        let (mut source, probe) = ScriptedSource::new(
            temp_file.path(),
            vec![ScriptStep::write("x\n", &[ChangeKind::Modified])],
        );

        let batch = source.next_batch().await.unwrap();
        assert_eq!(batch, vec![ChangeEvent::new(ChangeKind::Modified)]);
        assert_eq!(std::fs::read_to_string(temp_file.path()).unwrap(), "x\n");
        assert!(matches!(
            source.next_batch().await,
            Err(Error::SubscriptionClosed)
        ));

        source.close();
        assert!(probe.is_closed());
        assert_eq!(probe.batches_served(), 1);
        assert!(!probe.is_released());

        drop(source);
        assert!(probe.is_released());
    }

    #[tokio::test]
    async fn test_parked_source_waits_after_script() {
        let temp_file = TempLogFile::new().unwrap();
        let (mut source, _probe) = ScriptedSource::parked(temp_file.path(), Vec::new());

        let next = tokio::time::timeout(Duration::from_millis(50), source.next_batch()).await;
        assert!(next.is_err(), "parked source must not complete");
    }
}
