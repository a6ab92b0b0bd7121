//! Incremental byte-offset tailing of a single append-only log file.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// Complete lines read since the cursor, not yet committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailBatch {
    pub lines: Vec<String>,
    /// Offset just past the last complete line in this batch.
    pub end_offset: u64,
    /// The file was shorter than the cursor and was re-read from offset 0.
    pub rotated: bool,
}

impl TailBatch {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    cursor: u64,
}

impl LogTailer {
    /// Opens the tailer with its cursor at the current end of file, or 0 if
    /// the file does not exist yet. Existing history is never replayed.
    pub fn open_at_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cursor = match std::fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "log file not readable yet; tailing from offset 0"
                );
                0
            }
        };
        Self { path, cursor }
    }

    pub fn with_cursor(path: impl Into<PathBuf>, cursor: u64) -> Self {
        Self {
            path: path.into(),
            cursor,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Reads every complete line appended after the cursor.
    ///
    /// The cursor itself does not move; call [`LogTailer::commit`] once the
    /// batch has been dispatched. A file shorter than the cursor is treated
    /// as rotated and read from the beginning. Trailing bytes without a
    /// newline stay unconsumed until the line is completed.
    pub fn read_pending(&mut self) -> Result<TailBatch> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("failed to open log file {}", self.path.display()))?;
        let length = file
            .metadata()
            .with_context(|| format!("failed to stat log file {}", self.path.display()))?
            .len();

        let mut rotated = false;
        if length < self.cursor {
            tracing::info!(
                path = %self.path.display(),
                previous_offset = self.cursor,
                length,
                "log file shrank; treating as rotation"
            );
            self.cursor = 0;
            rotated = true;
        }
        if length == self.cursor {
            return Ok(TailBatch {
                lines: Vec::new(),
                end_offset: self.cursor,
                rotated,
            });
        }

        file.seek(SeekFrom::Start(self.cursor))
            .with_context(|| format!("failed to seek log file {}", self.path.display()))?;
        let mut buffer = Vec::with_capacity((length - self.cursor) as usize);
        file.take(length - self.cursor)
            .read_to_end(&mut buffer)
            .with_context(|| format!("failed to read log file {}", self.path.display()))?;

        let complete = match buffer.iter().rposition(|byte| *byte == b'\n') {
            Some(index) => index + 1,
            None => 0,
        };
        let lines = split_complete_lines(&buffer[..complete]);
        Ok(TailBatch {
            lines,
            end_offset: self.cursor + complete as u64,
            rotated,
        })
    }

    /// Advances the cursor past a dispatched batch.
    pub fn commit(&mut self, batch: &TailBatch) {
        self.cursor = batch.end_offset;
    }
}

fn split_complete_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|byte| *byte == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            String::from_utf8_lossy(line).into_owned()
        })
        .filter(|line| !line.is_empty())
        .collect()
}
