//! Administrative record log.
//!
//! One line per semaphore creation, `<tag> <key> <id>`, appended when `open`
//! creates a set. The log is only read by listing and removal tooling; the
//! semaphore operations never consult it.
//!
//! [`RecordScanner`] keeps a byte cursor between calls, so a follower can
//! poll it repeatedly and pick up records appended since the last poll.

use crate::error::{Result, SemError};
use crate::sem::{Key, SemId, Tag};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Suffix appended to a backing file path to name its default record log.
pub const RECORD_SUFFIX: &str = ".records";

/// A creation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub tag: Tag,
    pub key: Key,
    pub id: SemId,
}

impl Record {
    /// Render as a log line, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{} {} {}", self.tag, self.key, self.id)
    }

    /// Parse a log line. Returns `None` for anything malformed.
    pub fn parse(line: &str) -> Option<Record> {
        let mut fields = line.split_whitespace();
        let tag = fields.next()?.parse::<Tag>().ok()?;
        let key = Key(fields.next()?.parse().ok()?);
        let id = SemId::from_raw(fields.next()?.parse().ok()?);
        if fields.next().is_some() {
            return None;
        }
        Some(Record { tag, key, id })
    }
}

/// The record log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLog {
    path: PathBuf,
}

impl RecordLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The default log for a backing file: the same path with [`RECORD_SUFFIX`].
    pub fn for_backing(backing: &Path) -> Self {
        let mut path = backing.as_os_str().to_os_string();
        path.push(RECORD_SUFFIX);
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the log if needed.
    pub fn append(&self, record: &Record) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        writeln!(file, "{}", record.to_line()).map_err(|e| self.io_error(e))
    }

    /// Start a sequential scan from the beginning of the log.
    pub fn scanner(&self) -> RecordScanner {
        RecordScanner {
            path: self.path.clone(),
            cursor: 0,
        }
    }

    /// Every complete record currently in the log.
    pub fn read_all(&self) -> Result<Vec<Record>> {
        let mut scanner = self.scanner();
        let mut records = Vec::new();
        while let Some(record) = scanner.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Empty the log. Used by the remove-all sweep.
    pub fn truncate(&self) -> Result<()> {
        match OpenOptions::new().write(true).truncate(true).open(&self.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> SemError {
        SemError::Records {
            path: self.path.clone(),
            source,
        }
    }
}

/// Sequential reader with a cursor that persists across calls.
#[derive(Debug)]
pub struct RecordScanner {
    path: PathBuf,
    cursor: u64,
}

impl RecordScanner {
    /// The next complete record, or `None` at the current end of the log.
    ///
    /// A trailing line without its newline is still being written and is
    /// left for a later call. If the log shrank, the scan restarts.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let len = file.metadata().map_err(|e| self.io_error(e))?.len();
        if len < self.cursor {
            self.cursor = 0;
        }

        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(self.cursor))
            .map_err(|e| self.io_error(e))?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line).map_err(|e| self.io_error(e))?;
            if read == 0 || !line.ends_with('\n') {
                return Ok(None);
            }
            self.cursor += read as u64;

            match Record::parse(&line) {
                Some(record) => return Ok(Some(record)),
                None if line.trim().is_empty() => {}
                None => warn!(path = %self.path.display(), line = line.trim_end(), "skipping malformed record"),
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> SemError {
        SemError::Records {
            path: self.path.clone(),
            source,
        }
    }
}
