// src/core/query/ast.rs

//! Statement types produced by the parser.

use crate::core::instance::{ColumnType, Condition, Value};

/// One parsed, immutable unit of query work.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable {
        name: String,
        columns: Vec<(String, ColumnType)>,
    },
    DropTable {
        name: String,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Value>>,
    },
    Select {
        table: String,
        projection: Projection,
        filter: Vec<Condition>,
    },
    Delete {
        table: String,
        filter: Vec<Condition>,
    },
    ShowTables,
    Describe {
        table: String,
    },
}

/// The column list of a `SELECT`.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

impl Statement {
    /// A short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Statement::CreateTable { .. } => "CREATE TABLE",
            Statement::DropTable { .. } => "DROP TABLE",
            Statement::Insert { .. } => "INSERT",
            Statement::Select { .. } => "SELECT",
            Statement::Delete { .. } => "DELETE",
            Statement::ShowTables => "SHOW TABLES",
            Statement::Describe { .. } => "DESCRIBE",
        }
    }

    /// True for statements that change the instance.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Statement::CreateTable { .. }
                | Statement::DropTable { .. }
                | Statement::Insert { .. }
                | Statement::Delete { .. }
        )
    }
}
