use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::entry::{LogEntry, LogParser, SourceQuery};
use crate::error::{Error, Result};

/// Reads firewall entries from a finished log, skipping other lines
pub struct LogReader<R> {
    reader: R,
    buf: Vec<u8>,
    parser: LogParser,
    path: Option<PathBuf>,
    line_number: u64,
}

impl LogReader<BufReader<File>> {
    /// Open a log file for reading from the start
    pub fn open(path: impl AsRef<Path>, parser: LogParser) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::from(e).in_file(path))?;
        let mut reader = Self::new(BufReader::new(file), parser);
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }
}

impl<R: BufRead> LogReader<R> {
    pub fn new(reader: R, parser: LogParser) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            parser,
            path: None,
            line_number: 0,
        }
    }

    /// Number of raw lines consumed so far
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Collect every remaining entry with a matching source address
    pub fn match_source<Q: SourceQuery + ?Sized>(self, query: &Q) -> Result<Vec<LogEntry>> {
        let mut matched = Vec::new();
        for entry in self {
            let entry = entry?;
            if entry.match_source(query) {
                matched.push(entry);
            }
        }
        Ok(matched)
    }

    fn wrap(&self, err: Error) -> Error {
        match &self.path {
            Some(path) => err.in_file(path),
            None => err,
        }
    }
}

impl<R: BufRead> Iterator for LogReader<R> {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(self.wrap(e.into()))),
            }
            self.line_number += 1;

            // Lines from other programs may carry any bytes
            let line = String::from_utf8_lossy(&self.buf);
            match self.parser.parse(&line) {
                Ok(entry) if entry.is_firewall() => return Some(Ok(entry)),
                Ok(_) => {
                    debug!(line_number = self.line_number, "skipping non-firewall line");
                }
                Err(e) => return Some(Err(self.wrap(e))),
            }
        }
    }
}
