// src/core/instance/log.rs

//! The append-only mutation log backing an [`Instance`](super::Instance).
//!
//! Every committed mutation is one JSON line holding a sequence number and
//! the entry itself. On open the log is replayed line by line; a torn final
//! line left by a crash mid-append is discarded.

use super::relation::{Column, Condition, Value};
use crate::config::LogFsync;
use crate::core::SigmaError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// A single mutation recorded in the log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LogEntry {
    CreateRelation { name: String, columns: Vec<Column> },
    DropRelation { name: String },
    Insert { relation: String, rows: Vec<Vec<Value>> },
    Delete { relation: String, filter: Vec<Condition> },
}

#[derive(Deserialize)]
struct LogRecord {
    seq: u64,
    entry: LogEntry,
}

#[derive(Serialize)]
struct LogRecordRef<'a> {
    seq: u64,
    entry: &'a LogEntry,
}

/// Serializes a record into a newline-terminated line.
pub(super) fn encode_record(seq: u64, entry: &LogEntry) -> Result<Vec<u8>, SigmaError> {
    let mut line = serde_json::to_vec(&LogRecordRef { seq, entry })?;
    line.push(b'\n');
    Ok(line)
}

/// Entries read back from an existing log file.
pub(super) struct Replay {
    pub entries: Vec<(usize, LogEntry)>,
    pub last_seq: u64,
    /// Length of the valid prefix of the file.
    pub valid_len: u64,
    pub torn_tail: bool,
}

/// Reads every complete record of the log at `path`.
pub(super) async fn read_log(path: &Path) -> Result<Replay, SigmaError> {
    let file = File::open(path).await.map_err(|e| {
        SigmaError::Storage(format!("cannot read log '{}': {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);
    let mut replay = Replay {
        entries: Vec::new(),
        last_seq: 0,
        valid_len: 0,
        torn_tail: false,
    };

    let mut buf = Vec::with_capacity(512);
    let mut line_no = 0;
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            break;
        }
        line_no += 1;
        if buf.last() != Some(&b'\n') {
            warn!(
                "Log '{}' has a torn record at line {} ({} bytes). Discarding it.",
                path.display(),
                line_no,
                n
            );
            replay.torn_tail = true;
            break;
        }

        let body = &buf[..buf.len() - 1];
        if body.iter().all(u8::is_ascii_whitespace) {
            replay.valid_len += n as u64;
            continue;
        }
        let record: LogRecord =
            serde_json::from_slice(body).map_err(|e| SigmaError::CorruptLog {
                line: line_no,
                reason: e.to_string(),
            })?;
        if record.seq <= replay.last_seq {
            return Err(SigmaError::CorruptLog {
                line: line_no,
                reason: format!(
                    "sequence number {} does not follow {}",
                    record.seq, replay.last_seq
                ),
            });
        }
        replay.last_seq = record.seq;
        replay.valid_len += n as u64;
        replay.entries.push((line_no, record.entry));
    }

    debug!(
        "Read {} records from log '{}'.",
        replay.entries.len(),
        path.display()
    );
    Ok(replay)
}

/// Appends records to the log file.
#[derive(Debug)]
pub(super) struct LogWriter {
    path: PathBuf,
    file: File,
    /// Length of the file up to the last fully written record.
    len: u64,
    fsync: LogFsync,
}

impl LogWriter {
    /// Opens the log for appending, truncating it to `valid_len` first.
    pub async fn open(path: &Path, valid_len: u64, fsync: LogFsync) -> Result<Self, SigmaError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| {
                SigmaError::Storage(format!("cannot open log '{}': {e}", path.display()))
            })?;
        let current_len = file.metadata().await?.len();
        if current_len != valid_len {
            file.set_len(valid_len).await?;
            info!(
                "Truncated log '{}' from {} to {} bytes.",
                path.display(),
                current_len,
                valid_len
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len: valid_len,
            fsync,
        })
    }

    /// Appends one encoded record. On failure the file is cut back to its
    /// previous length so no partial record survives.
    pub async fn append(&mut self, line: &[u8]) -> Result<(), SigmaError> {
        match self.write_line(line).await {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(truncate_err) = self.file.set_len(self.len).await {
                    warn!(
                        "Could not roll back partial record in '{}': {}",
                        self.path.display(),
                        truncate_err
                    );
                }
                Err(SigmaError::Storage(format!(
                    "failed to append to log '{}': {e}",
                    self.path.display()
                )))
            }
        }
    }

    async fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line).await?;
        self.file.flush().await?;
        if self.fsync == LogFsync::Always {
            self.file.sync_data().await?;
        }
        Ok(())
    }

    /// Flushes and syncs the file, releasing the handle.
    pub async fn close(mut self) -> Result<(), SigmaError> {
        self.file.flush().await?;
        self.file.sync_all().await.map_err(|e| {
            SigmaError::Storage(format!("failed to sync log '{}': {e}", self.path.display()))
        })?;
        debug!("Log '{}' closed at {} bytes.", self.path.display(), self.len);
        Ok(())
    }
}
