// src/core/instance/relation.rs

//! In-memory representation of relations, their columns and values.

use crate::core::SigmaError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The type of a column.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Text,
    Bool,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int => f.write_str("INT"),
            ColumnType::Text => f.write_str("TEXT"),
            ColumnType::Bool => f.write_str("BOOL"),
        }
    }
}

/// A single stored value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Int(_) => ColumnType::Int,
            Value::Text(_) => ColumnType::Text,
            Value::Bool(_) => ColumnType::Bool,
        }
    }

    /// Compares two values of the same type. Returns `None` across types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(true) => f.write_str("true"),
            Value::Bool(false) => f.write_str("false"),
        }
    }
}

/// A named, typed column of a relation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

/// Comparison operators usable in filters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        };
        f.write_str(s)
    }
}

/// `column op value`. A filter is a conjunction of conditions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

/// A relation: an ordered list of columns and a bag of rows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Relation {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Relation {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Checks that every row has the right arity and column types.
    pub fn check_rows(&self, rows: &[Vec<Value>]) -> Result<(), SigmaError> {
        for row in rows {
            if row.len() != self.columns.len() {
                return Err(SigmaError::ArityMismatch {
                    expected: self.columns.len(),
                    found: row.len(),
                });
            }
            for (column, value) in self.columns.iter().zip(row) {
                if value.column_type() != column.ty {
                    return Err(SigmaError::TypeMismatch {
                        column: column.name.clone(),
                        expected: column.ty.to_string(),
                        found: value.column_type().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolves a filter into `(column index, op, value)` triples, validating
    /// column names and value types.
    pub fn resolve_filter(
        &self,
        relation_name: &str,
        filter: &[Condition],
    ) -> Result<Vec<(usize, CompareOp, Value)>, SigmaError> {
        filter
            .iter()
            .map(|cond| {
                let idx = self.column_index(&cond.column).ok_or_else(|| {
                    SigmaError::UnknownColumn {
                        relation: relation_name.to_string(),
                        column: cond.column.clone(),
                    }
                })?;
                let ty = self.columns[idx].ty;
                if cond.value.column_type() != ty {
                    return Err(SigmaError::TypeMismatch {
                        column: cond.column.clone(),
                        expected: ty.to_string(),
                        found: cond.value.column_type().to_string(),
                    });
                }
                Ok((idx, cond.op, cond.value.clone()))
            })
            .collect()
    }

    /// Iterates over the rows matching an already resolved filter.
    pub fn matching<'a>(
        &'a self,
        resolved: &'a [(usize, CompareOp, Value)],
    ) -> impl Iterator<Item = &'a Vec<Value>> + 'a {
        self.rows.iter().filter(move |row| row_matches(row, resolved))
    }

    pub(super) fn push_rows(&mut self, rows: Vec<Vec<Value>>) {
        self.rows.extend(rows);
    }

    /// Removes matching rows and returns how many were removed.
    pub(super) fn remove_matching(&mut self, resolved: &[(usize, CompareOp, Value)]) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| !row_matches(row, resolved));
        before - self.rows.len()
    }
}

fn row_matches(row: &[Value], resolved: &[(usize, CompareOp, Value)]) -> bool {
    resolved.iter().all(|(idx, op, value)| {
        row.get(*idx)
            .and_then(|v| v.compare(value))
            .is_some_and(|ordering| op.holds(ordering))
    })
}
