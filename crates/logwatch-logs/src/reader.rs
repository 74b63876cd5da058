//! Incremental reading of a growing log file

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::WatchError;

/// File-position bookkeeping for one watched file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadCursor {
    pub file_path: PathBuf,

    /// Byte offset just past the last complete line handed out
    pub last_byte_offset: u64,

    /// File size observed by the last successful poll
    pub last_known_size: u64,
}

/// Lines produced by one poll
#[derive(Debug, Default)]
pub struct PollBatch {
    /// New lines, without line terminators, blank lines skipped
    pub lines: Vec<String>,

    /// Whether a size decrease reset the cursor to the start of the file
    pub rotated: bool,
}

impl PollBatch {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Reader that yields only the lines appended since the previous poll.
///
/// A trailing line without a newline is left unread until it is completed,
/// so a line being written is never emitted half-way.
pub struct IncrementalReader {
    cursor: ReadCursor,
}

impl IncrementalReader {
    /// Open a reader positioned at the start of the file.
    ///
    /// Fails with `FileAccess` if the path is missing or not a regular file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WatchError> {
        let file_path = path.as_ref().to_path_buf();
        let size = Self::validate(&file_path)?;

        Ok(Self {
            cursor: ReadCursor {
                file_path,
                last_byte_offset: 0,
                last_known_size: size,
            },
        })
    }

    /// Open a reader that skips everything already in the file
    pub fn open_at_end(path: impl AsRef<Path>) -> Result<Self, WatchError> {
        let mut reader = Self::open(path)?;
        reader.cursor.last_byte_offset = reader.cursor.last_known_size;
        Ok(reader)
    }

    fn validate(path: &Path) -> Result<u64, WatchError> {
        let metadata = fs::metadata(path).map_err(|source| WatchError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(WatchError::FileAccess {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }
        Ok(metadata.len())
    }

    pub fn cursor(&self) -> &ReadCursor {
        &self.cursor
    }

    pub fn path(&self) -> &Path {
        &self.cursor.file_path
    }

    /// Read complete lines appended since the last poll.
    ///
    /// On failure the cursor is left untouched, so the next successful poll
    /// neither skips nor repeats lines.
    pub fn poll(&mut self) -> Result<PollBatch, WatchError> {
        self.read_new(false)
    }

    /// Read everything up to EOF, including a final unterminated line
    pub fn read_remaining(&mut self) -> Result<PollBatch, WatchError> {
        self.read_new(true)
    }

    fn read_new(&mut self, include_partial: bool) -> Result<PollBatch, WatchError> {
        let size = fs::metadata(&self.cursor.file_path)
            .map_err(|e| self.read_error(e))?
            .len();

        // Any shrink means the file was replaced or truncated, even when a
        // pending partial line keeps the offset below the new size
        let mut offset = self.cursor.last_byte_offset;
        let rotated = size < self.cursor.last_known_size || size < offset;
        if rotated {
            tracing::info!(
                path = %self.cursor.file_path.display(),
                previous = offset,
                current = size,
                "file shrank, reading from start"
            );
            offset = 0;
        }

        if size == offset {
            self.commit(offset, size);
            return Ok(PollBatch {
                lines: Vec::new(),
                rotated,
            });
        }

        let (lines, consumed) = self
            .read_lines_from(offset, include_partial)
            .map_err(|e| self.read_error(e))?;

        tracing::debug!(
            path = %self.cursor.file_path.display(),
            offset,
            consumed,
            lines = lines.len(),
            "polled log file"
        );

        self.commit(offset + consumed, size);
        Ok(PollBatch { lines, rotated })
    }

    fn read_lines_from(
        &self,
        offset: u64,
        include_partial: bool,
    ) -> io::Result<(Vec<String>, u64)> {
        let mut file = File::open(&self.cursor.file_path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);

        let mut lines = Vec::new();
        let mut consumed = 0u64;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            let complete = buf.last() == Some(&b'\n');
            if !complete && !include_partial {
                break;
            }
            consumed += n as u64;

            let line = decode_line(&buf);
            if !line.is_empty() {
                lines.push(line);
            }
        }

        Ok((lines, consumed))
    }

    fn commit(&mut self, offset: u64, size: u64) {
        self.cursor.last_byte_offset = offset;
        self.cursor.last_known_size = size.max(offset);
    }

    fn read_error(&self, source: io::Error) -> WatchError {
        WatchError::TransientRead {
            path: self.cursor.file_path.clone(),
            source,
        }
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8
fn decode_line(bytes: &[u8]) -> String {
    let mut end = bytes.len();
    while end > 0 && matches!(bytes[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
