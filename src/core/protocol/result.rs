// src/core/protocol/result.rs

//! The outcome of evaluating one statement.

use crate::core::SigmaError;
use crate::core::instance::Value;

/// Exactly one of acknowledgement, error or relation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Ack(String),
    Error(String),
    Relation {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

impl QueryResult {
    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }
}

impl From<SigmaError> for QueryResult {
    fn from(e: SigmaError) -> Self {
        QueryResult::Error(e.to_string())
    }
}
