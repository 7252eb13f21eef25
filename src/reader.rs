//! Incremental line reading from a file that is still being written.

use crate::config::LineFormat;
use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 8 * 1024;

/// Why the last drain stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfStream {
    /// Reached the current end of the file; more may be appended later.
    Soft,
    /// A read failed. The reader will not read again.
    Hard,
}

/// Snapshot of a reader's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSession {
    /// Bytes consumed from the file so far, including any held-back partial line.
    pub cursor: u64,
    pub end_of_stream: Option<EndOfStream>,
}

/// Reads complete lines from an open file, resuming where the previous
/// drain left off.
///
/// A drain that reaches the end of the file latches [`EndOfStream::Soft`].
/// While latched, drains return nothing; [`LineReader::reset_soft_eof`]
/// must be called before new content becomes visible.
///
/// A read or decoding failure latches [`EndOfStream::Hard`]. Lines completed
/// before the failure are still returned by that drain; the failure itself
/// is then available from [`LineReader::take_failure`] and from the next
/// drain.
#[derive(Debug)]
pub struct LineReader {
    path: PathBuf,
    file: Option<File>,
    separator: Vec<u8>,
    skip_blank: bool,
    cursor: u64,
    /// Bytes of a line whose separator has not arrived yet.
    pending: Vec<u8>,
    /// Length of `pending` already searched for a separator.
    scanned: usize,
    eof: Option<EndOfStream>,
    /// Failure held back so the lines read before it could be returned.
    failure: Option<Error>,
    chunk: Box<[u8]>,
}

impl LineReader {
    /// Opens `path` for reading from the start with newline-delimited lines.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &LineFormat::default()).await
    }

    /// Opens `path` for reading from the start with the given line format.
    pub async fn open_with<P: AsRef<Path>>(path: P, format: &LineFormat) -> Result<Self> {
        if format.separator.is_empty() {
            return Err(Error::InvalidConfig {
                message: "line separator must not be empty".to_string(),
            });
        }

        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;

        Ok(Self {
            path,
            file: Some(file),
            separator: format.separator.as_bytes().to_vec(),
            skip_blank: format.skip_blank,
            cursor: 0,
            pending: Vec::new(),
            scanned: 0,
            eof: None,
            failure: None,
            chunk: vec![0; READ_CHUNK].into_boxed_slice(),
        })
    }

    /// Reads until the current end of file and returns every line completed
    /// since the previous call. A trailing unterminated line is held back.
    ///
    /// If reading fails after some lines were completed, those lines are
    /// returned and the failure is kept for [`LineReader::take_failure`].
    pub async fn drain(&mut self) -> Result<Vec<String>> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        match self.eof {
            Some(EndOfStream::Hard) => return Err(Error::ReaderClosed),
            Some(EndOfStream::Soft) => return Ok(Vec::new()),
            None => {}
        }
        let file = self.file.as_mut().ok_or(Error::ReaderClosed)?;

        let mut lines = Vec::new();
        let failure = loop {
            match file.read(&mut self.chunk).await {
                Ok(0) => {
                    self.eof = Some(EndOfStream::Soft);
                    break None;
                }
                Ok(n) => {
                    self.cursor += n as u64;
                    self.pending.extend_from_slice(&self.chunk[..n]);
                    let split = split_complete(
                        &mut self.pending,
                        &mut self.scanned,
                        &self.separator,
                        self.skip_blank,
                        &mut lines,
                    );
                    if let Err(e) = split {
                        break Some(e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    break Some(Error::HardIo {
                        offset: self.cursor,
                        source: e,
                    });
                }
            }
        };

        if let Some(e) = failure {
            self.eof = Some(EndOfStream::Hard);
            tracing::debug!(
                path = %self.path.display(),
                kept = lines.len(),
                error = %e,
                "reader failed"
            );
            if lines.is_empty() {
                return Err(e);
            }
            self.failure = Some(e);
        }

        Ok(lines)
    }

    /// Takes the failure left behind by a drain that still returned lines.
    pub fn take_failure(&mut self) -> Option<Error> {
        self.failure.take()
    }

    /// Clears a soft end-of-stream so the next drain reads again from the
    /// preserved cursor. A hard end-of-stream is left in place.
    pub fn reset_soft_eof(&mut self) {
        if self.eof == Some(EndOfStream::Soft) {
            self.eof = None;
        }
    }

    pub fn end_of_stream(&self) -> Option<EndOfStream> {
        self.eof
    }

    pub fn session(&self) -> ReadSession {
        ReadSession {
            cursor: self.cursor,
            end_of_stream: self.eof,
        }
    }

    /// Number of bytes held back as an incomplete line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Releases the file handle. Safe to call more than once.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            tracing::debug!(path = %self.path.display(), cursor = self.cursor, "closed reader");
        }
    }
}

/// Moves every separator-terminated line out of `pending` into `out`,
/// leaving only the unterminated remainder.
fn split_complete(
    pending: &mut Vec<u8>,
    scanned: &mut usize,
    separator: &[u8],
    skip_blank: bool,
    out: &mut Vec<String>,
) -> Result<()> {
    let mut start = 0;
    // A separator may straddle the boundary of the previous read.
    let mut search = scanned.saturating_sub(separator.len() - 1);

    while let Some(found) = find(&pending[search..], separator) {
        let end = search + found;
        let line = String::from_utf8(pending[start..end].to_vec())?;
        if !(skip_blank && line.trim().is_empty()) {
            out.push(line);
        }
        start = end + separator.len();
        search = start;
    }

    pending.drain(..start);
    *scanned = pending.len();
    Ok(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
