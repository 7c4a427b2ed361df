// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
///
/// Variants fall into three groups: startup failures (`Bind`, `Storage`,
/// `CorruptLog`), statement-local failures that are reported back to the
/// client as data (`Parse` and the evaluation variants), and session-local
/// failures that end one connection (`Io`, `BufferLimitExceeded`).
#[derive(Error, Debug)]
pub enum SigmaError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("cannot bind socket '{}': {reason}", path.display())]
    Bind { path: PathBuf, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt log at line {line}: {reason}")]
    CorruptLog { line: usize, reason: String },

    #[error("instance is closed")]
    InstanceClosed,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("relation '{0}' does not exist")]
    UnknownRelation(String),

    #[error("relation '{0}' already exists")]
    RelationExists(String),

    #[error("column '{column}' does not exist in relation '{relation}'")]
    UnknownColumn { relation: String, column: String },

    #[error("type mismatch for column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("expected {expected} values, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    #[error("buffered input exceeds {0} bytes without a complete statement")]
    BufferLimitExceeded(usize),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl SigmaError {
    /// Returns true for failures that belong to a single statement and are
    /// reported to the client without ending the session.
    pub fn is_statement_local(&self) -> bool {
        matches!(
            self,
            SigmaError::Parse(_)
                | SigmaError::UnknownRelation(_)
                | SigmaError::RelationExists(_)
                | SigmaError::UnknownColumn { .. }
                | SigmaError::TypeMismatch { .. }
                | SigmaError::ArityMismatch { .. }
                | SigmaError::InvalidStatement(_)
        )
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for SigmaError {
    fn clone(&self) -> Self {
        match self {
            SigmaError::Io(e) => SigmaError::Io(Arc::clone(e)),
            SigmaError::Bind { path, reason } => SigmaError::Bind {
                path: path.clone(),
                reason: reason.clone(),
            },
            SigmaError::Storage(s) => SigmaError::Storage(s.clone()),
            SigmaError::CorruptLog { line, reason } => SigmaError::CorruptLog {
                line: *line,
                reason: reason.clone(),
            },
            SigmaError::InstanceClosed => SigmaError::InstanceClosed,
            SigmaError::Parse(s) => SigmaError::Parse(s.clone()),
            SigmaError::UnknownRelation(s) => SigmaError::UnknownRelation(s.clone()),
            SigmaError::RelationExists(s) => SigmaError::RelationExists(s.clone()),
            SigmaError::UnknownColumn { relation, column } => SigmaError::UnknownColumn {
                relation: relation.clone(),
                column: column.clone(),
            },
            SigmaError::TypeMismatch {
                column,
                expected,
                found,
            } => SigmaError::TypeMismatch {
                column: column.clone(),
                expected: expected.clone(),
                found: found.clone(),
            },
            SigmaError::ArityMismatch { expected, found } => SigmaError::ArityMismatch {
                expected: *expected,
                found: *found,
            },
            SigmaError::InvalidStatement(s) => SigmaError::InvalidStatement(s.clone()),
            SigmaError::BufferLimitExceeded(n) => SigmaError::BufferLimitExceeded(*n),
            SigmaError::Internal(s) => SigmaError::Internal(s.clone()),
        }
    }
}

impl PartialEq for SigmaError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SigmaError::Io(e1), SigmaError::Io(e2)) => e1.kind() == e2.kind(),
            (
                SigmaError::Bind { path: p1, .. },
                SigmaError::Bind { path: p2, .. },
            ) => p1 == p2,
            (SigmaError::Storage(s1), SigmaError::Storage(s2)) => s1 == s2,
            (
                SigmaError::CorruptLog { line: l1, .. },
                SigmaError::CorruptLog { line: l2, .. },
            ) => l1 == l2,
            (SigmaError::Parse(s1), SigmaError::Parse(s2)) => s1 == s2,
            (SigmaError::UnknownRelation(s1), SigmaError::UnknownRelation(s2)) => s1 == s2,
            (SigmaError::RelationExists(s1), SigmaError::RelationExists(s2)) => s1 == s2,
            (
                SigmaError::UnknownColumn {
                    relation: r1,
                    column: c1,
                },
                SigmaError::UnknownColumn {
                    relation: r2,
                    column: c2,
                },
            ) => r1 == r2 && c1 == c2,
            (
                SigmaError::TypeMismatch { column: c1, .. },
                SigmaError::TypeMismatch { column: c2, .. },
            ) => c1 == c2,
            (
                SigmaError::ArityMismatch {
                    expected: e1,
                    found: f1,
                },
                SigmaError::ArityMismatch {
                    expected: e2,
                    found: f2,
                },
            ) => e1 == e2 && f1 == f2,
            (SigmaError::InvalidStatement(s1), SigmaError::InvalidStatement(s2)) => s1 == s2,
            (SigmaError::BufferLimitExceeded(n1), SigmaError::BufferLimitExceeded(n2)) => {
                n1 == n2
            }
            (SigmaError::Internal(s1), SigmaError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for SigmaError {
    fn from(e: std::io::Error) -> Self {
        SigmaError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for SigmaError {
    fn from(e: serde_json::Error) -> Self {
        SigmaError::Storage(format!("log record encoding failed: {e}"))
    }
}

impl From<std::str::Utf8Error> for SigmaError {
    fn from(_: std::str::Utf8Error) -> Self {
        SigmaError::Parse("statement is not valid UTF-8".to_string())
    }
}
