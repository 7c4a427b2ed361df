// src/core/instance/mod.rs

//! The persistent relational instance shared by a server process.
//!
//! An `Instance` is not internally synchronized. The server only ever reaches
//! it through a [`GatePermit`](crate::core::gate::GatePermit), which is what
//! keeps concurrent sessions from interleaving mutations.

mod log;
mod relation;

pub use self::log::LogEntry;
pub use self::relation::{Column, ColumnType, CompareOp, Condition, Relation, Value};

use crate::config::LogFsync;
use crate::core::SigmaError;
use indexmap::IndexMap;
use self::log::LogWriter;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A mutation that has been checked against the current state and can be
/// applied without failing.
enum Prepared {
    Create(String, Relation),
    Drop(String),
    Insert(String, Vec<Vec<Value>>),
    Delete(String, Vec<(usize, CompareOp, Value)>),
}

#[derive(Debug)]
pub struct Instance {
    relations: IndexMap<String, Relation>,
    log: Option<LogWriter>,
    path: Option<PathBuf>,
    next_seq: u64,
    closed: bool,
}

impl Instance {
    /// Creates an empty instance that is not backed by a log.
    pub fn in_memory() -> Self {
        Self {
            relations: IndexMap::new(),
            log: None,
            path: None,
            next_seq: 1,
            closed: false,
        }
    }

    /// Opens the instance stored in the log at `path`, creating an empty log
    /// (and its parent directories) if none exists yet.
    pub async fn open(path: &Path, fsync: LogFsync) -> Result<Self, SigmaError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SigmaError::Storage(format!(
                    "cannot create log directory '{}': {e}",
                    parent.display()
                ))
            })?;
            info!("Created log directory: {}", parent.display());
        }

        let mut instance = Self::in_memory();
        instance.path = Some(path.to_path_buf());

        let valid_len = if path.exists() {
            info!("Replaying log file: {}", path.display());
            let replay = log::read_log(path).await?;
            let count = replay.entries.len();
            for (line, entry) in replay.entries {
                let prepared = instance
                    .prepare(entry)
                    .map_err(|e| SigmaError::CorruptLog {
                        line,
                        reason: e.to_string(),
                    })?;
                instance.apply(prepared);
            }
            instance.next_seq = replay.last_seq + 1;
            if replay.torn_tail {
                warn!("Log '{}' ended with a torn record.", path.display());
            }
            info!(
                "Replayed {} records into {} relations.",
                count,
                instance.relations.len()
            );
            replay.valid_len
        } else {
            info!(
                "Log file not found at '{}', starting with an empty instance.",
                path.display()
            );
            0
        };

        instance.log = Some(LogWriter::open(path, valid_len, fsync).await?);
        Ok(instance)
    }

    /// Opens a log-backed instance when a path is given, otherwise an
    /// in-memory one.
    pub async fn open_optional(path: Option<&Path>, fsync: LogFsync) -> Result<Self, SigmaError> {
        match path {
            Some(path) => Self::open(path, fsync).await,
            None => Ok(Self::in_memory()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of mutations committed over the lifetime of the log.
    pub fn committed(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn relation(&self, name: &str) -> Result<&Relation, SigmaError> {
        self.ensure_open()?;
        self.relations
            .get(name)
            .ok_or_else(|| SigmaError::UnknownRelation(name.to_string()))
    }

    pub fn relations(&self) -> Result<impl Iterator<Item = (&str, &Relation)>, SigmaError> {
        self.ensure_open()?;
        Ok(self.relations.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Validates `entry`, appends it to the log and applies it in memory.
    /// Returns the number of affected rows.
    ///
    /// Nothing is changed, neither on disk nor in memory, if validation or
    /// the log write fails.
    pub async fn commit(&mut self, entry: LogEntry) -> Result<usize, SigmaError> {
        self.ensure_open()?;
        let line = match self.log {
            Some(_) => Some(log::encode_record(self.next_seq, &entry)?),
            None => None,
        };
        let prepared = self.prepare(entry)?;
        if let (Some(log), Some(line)) = (self.log.as_mut(), line) {
            log.append(&line).await?;
        }
        self.next_seq += 1;
        Ok(self.apply(prepared))
    }

    /// Flushes and releases the log. Fails if the instance is already closed.
    pub async fn close(&mut self) -> Result<(), SigmaError> {
        if self.closed {
            return Err(SigmaError::Storage("instance is already closed".to_string()));
        }
        self.closed = true;
        if let Some(log) = self.log.take() {
            log.close().await?;
        }
        info!(
            "Instance closed after {} committed mutations.",
            self.committed()
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SigmaError> {
        if self.closed {
            Err(SigmaError::InstanceClosed)
        } else {
            Ok(())
        }
    }

    fn prepare(&self, entry: LogEntry) -> Result<Prepared, SigmaError> {
        match entry {
            LogEntry::CreateRelation { name, columns } => {
                if self.relations.contains_key(&name) {
                    return Err(SigmaError::RelationExists(name));
                }
                if columns.is_empty() {
                    return Err(SigmaError::InvalidStatement(format!(
                        "relation '{name}' needs at least one column"
                    )));
                }
                let mut seen = HashSet::new();
                for column in &columns {
                    if !seen.insert(column.name.as_str()) {
                        return Err(SigmaError::InvalidStatement(format!(
                            "duplicate column '{}' in relation '{name}'",
                            column.name
                        )));
                    }
                }
                Ok(Prepared::Create(name, Relation::new(columns)))
            }
            LogEntry::DropRelation { name } => {
                if !self.relations.contains_key(&name) {
                    return Err(SigmaError::UnknownRelation(name));
                }
                Ok(Prepared::Drop(name))
            }
            LogEntry::Insert { relation, rows } => {
                let target = self
                    .relations
                    .get(&relation)
                    .ok_or_else(|| SigmaError::UnknownRelation(relation.clone()))?;
                target.check_rows(&rows)?;
                Ok(Prepared::Insert(relation, rows))
            }
            LogEntry::Delete { relation, filter } => {
                let target = self
                    .relations
                    .get(&relation)
                    .ok_or_else(|| SigmaError::UnknownRelation(relation.clone()))?;
                let resolved = target.resolve_filter(&relation, &filter)?;
                Ok(Prepared::Delete(relation, resolved))
            }
        }
    }

    fn apply(&mut self, prepared: Prepared) -> usize {
        match prepared {
            Prepared::Create(name, relation) => {
                self.relations.insert(name, relation);
                0
            }
            Prepared::Drop(name) => self
                .relations
                .shift_remove(&name)
                .map(|r| r.len())
                .unwrap_or(0),
            Prepared::Insert(name, rows) => match self.relations.get_mut(&name) {
                Some(relation) => {
                    let n = rows.len();
                    relation.push_rows(rows);
                    n
                }
                None => 0,
            },
            Prepared::Delete(name, resolved) => self
                .relations
                .get_mut(&name)
                .map(|relation| relation.remove_matching(&resolved))
                .unwrap_or(0),
        }
    }
}
