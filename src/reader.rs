//! Line-oriented reading of the followed file.

use crate::error::Result;
use std::io::{Seek, SeekFrom};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

const NEWLINE: u8 = b'\n';

/// Where a freshly opened handle starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Deliver everything already in the file.
    Beginning,
    /// Skip existing content; deliver only what is appended later.
    End,
}

/// Buffered line reader over one open handle.
///
/// Bytes after the last newline are held back until the rest of the line
/// arrives, so every byte read is eventually part of exactly one line.
pub struct LineReader {
    inner: BufReader<File>,
    pending: Vec<u8>,
    offset: u64,
}

impl LineReader {
    /// Wraps `file`, positioned according to `start`.
    pub fn open_at(mut file: std::fs::File, start: StartPosition) -> Result<Self> {
        let offset = match start {
            StartPosition::Beginning => file.seek(SeekFrom::Start(0))?,
            StartPosition::End => file.seek(SeekFrom::End(0))?,
        };

        Ok(Self {
            inner: BufReader::new(File::from_std(file)),
            pending: Vec::new(),
            offset,
        })
    }

    /// Returns the next complete line without its trailing newline.
    ///
    /// `None` means the data currently available has been consumed; it is not
    /// an end-of-stream marker and the call never waits for more data.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let read = self.inner.read_until(NEWLINE, &mut self.pending).await?;
        self.offset += read as u64;

        if read == 0 || self.pending.last() != Some(&NEWLINE) {
            return Ok(None);
        }

        Ok(Some(take_line(&mut self.pending)))
    }

    /// Rewinds to the start if the file shrank below what was already read.
    ///
    /// Returns `true` when a rewind happened.
    pub async fn rewind_if_truncated(&mut self) -> Result<bool> {
        let current_size = self.inner.get_ref().metadata().await?.len();
        if !detect_file_truncation(current_size, self.offset) {
            return Ok(false);
        }

        self.inner.seek(SeekFrom::Start(0)).await?;
        self.pending.clear();
        self.offset = 0;
        Ok(true)
    }

    /// Bytes consumed from the file so far, including any held partial line.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// Detect if the file was truncated by comparing current size with last position
fn detect_file_truncation(current_size: u64, last_position: u64) -> bool {
    current_size < last_position
}

fn take_line(pending: &mut Vec<u8>) -> String {
    let mut bytes = std::mem::take(pending);
    bytes.pop();
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
