use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::entry::{LogEntry, LogParser};
use crate::error::{Error, Result};

/// Follows a growing log file, yielding new firewall entries.
///
/// Only newline-terminated lines are consumed; a partially written last
/// line stays on disk until it is completed. When the file shrinks below
/// the current offset it is assumed to be truncated or rotated and reading
/// restarts at offset 0, which may re-read lines but never skips them.
pub struct TailReader {
    path: PathBuf,
    parser: LogParser,
    /// Byte offset of the next unread line
    position: u64,
    /// Complete lines read but not yet handed out
    pending: VecDeque<String>,
}

impl TailReader {
    /// Create a reader positioned at the start of the file
    pub fn new(path: impl AsRef<Path>, parser: LogParser) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            parser,
            position: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset up to which the file has been consumed
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Skip everything currently in the file
    pub fn seek_to_end(&mut self) -> Result<u64> {
        self.pending.clear();
        self.position = match File::open(&self.path) {
            Ok(file) => file.metadata().map_err(|e| self.wrap(e.into()))?.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Log file {} does not exist yet", self.path.display());
                0
            }
            Err(e) => return Err(self.wrap(e.into())),
        };
        Ok(self.position)
    }

    /// Resume from a previously saved offset
    pub fn seek_to(&mut self, position: u64) {
        self.pending.clear();
        self.position = position;
    }

    /// Return the next new firewall entry, or `None` if there is nothing
    /// new yet. Never blocks.
    pub fn poll_entry(&mut self) -> Result<Option<LogEntry>> {
        loop {
            if self.pending.is_empty() && self.read_available()? == 0 {
                return Ok(None);
            }

            let Some(line) = self.pending.pop_front() else {
                return Ok(None);
            };

            let entry = self.parser.parse(&line).map_err(|e| self.wrap(e))?;
            if entry.is_firewall() {
                return Ok(Some(entry));
            }
        }
    }

    /// Block until a new firewall entry is appended
    pub fn next_entry(&mut self, interval: Duration) -> Result<LogEntry> {
        loop {
            if let Some(entry) = self.poll_entry()? {
                return Ok(entry);
            }
            thread::sleep(interval);
        }
    }

    /// Endless blocking iterator over new entries
    pub fn follow(&mut self, interval: Duration) -> Follow<'_> {
        Follow {
            reader: self,
            interval,
        }
    }

    /// Read newly appended complete lines into the pending queue
    fn read_available(&mut self) -> Result<usize> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Log file {} does not exist", self.path.display());
                return Ok(0);
            }
            Err(e) => return Err(self.wrap(e.into())),
        };

        let file_size = file.metadata().map_err(|e| self.wrap(e.into()))?.len();
        if file_size < self.position {
            info!(
                "Log file {} truncated or rotated, resetting position",
                self.path.display()
            );
            self.position = 0;
        }
        if file_size == self.position {
            return Ok(0);
        }

        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(self.position))
            .map_err(|e| self.wrap(e.into()))?;

        let mut count = 0;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| self.wrap(e.into()))?;
            if read == 0 || buf.last() != Some(&b'\n') {
                break;
            }
            self.position += read as u64;
            self.pending
                .push_back(String::from_utf8_lossy(&buf).into_owned());
            count += 1;
        }

        debug!(lines = count, position = self.position, "read new log lines");
        Ok(count)
    }

    fn wrap(&self, err: Error) -> Error {
        err.in_file(&self.path)
    }
}

/// Blocking iterator returned by [`TailReader::follow`]
pub struct Follow<'a> {
    reader: &'a mut TailReader,
    interval: Duration,
}

impl Iterator for Follow<'_> {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.reader.next_entry(self.interval))
    }
}
