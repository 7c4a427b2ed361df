// src/core/engine.rs

//! Evaluates parsed statements against an `Instance`.
//!
//! The evaluator is only ever called while the caller holds the
//! serialization gate, so it can treat the instance as exclusively its own
//! for the whole statement.

use crate::core::SigmaError;
use crate::core::instance::{Column, Instance, LogEntry, Relation, Value};
use crate::core::protocol::QueryResult;
use crate::core::query::{Projection, Statement};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Evaluates one statement. Failures are reported as `QueryResult::Error`.
pub async fn evaluate(statement: Statement, instance: &mut Instance) -> QueryResult {
    let name = statement.name();
    let mutation = statement.is_mutation();
    match execute(statement, instance).await {
        Ok(result) => {
            if mutation {
                debug!("{name} committed as mutation {}", instance.committed());
            }
            result
        }
        Err(e) if e.is_statement_local() => {
            debug!("{name} failed: {e}");
            e.into()
        }
        Err(e) => {
            warn!("{name} failed: {e}");
            e.into()
        }
    }
}

async fn execute(
    statement: Statement,
    instance: &mut Instance,
) -> Result<QueryResult, SigmaError> {
    match statement {
        Statement::CreateTable { name, columns } => {
            let columns = columns
                .into_iter()
                .map(|(name, ty)| Column { name, ty })
                .collect();
            instance
                .commit(LogEntry::CreateRelation {
                    name: name.clone(),
                    columns,
                })
                .await?;
            Ok(QueryResult::Ack(format!("CREATE TABLE {name}")))
        }
        Statement::DropTable { name } => {
            instance
                .commit(LogEntry::DropRelation { name: name.clone() })
                .await?;
            Ok(QueryResult::Ack(format!("DROP TABLE {name}")))
        }
        Statement::Insert {
            table,
            columns,
            rows,
        } => {
            let rows = match columns {
                Some(columns) => {
                    reorder_rows(&table, instance.relation(&table)?, &columns, rows)?
                }
                None => rows,
            };
            let n = instance
                .commit(LogEntry::Insert {
                    relation: table,
                    rows,
                })
                .await?;
            Ok(QueryResult::Ack(format!("INSERT {n}")))
        }
        Statement::Select {
            table,
            projection,
            filter,
        } => {
            let relation = instance.relation(&table)?;
            let resolved = relation.resolve_filter(&table, &filter)?;
            let indices: Vec<usize> = match projection {
                Projection::All => (0..relation.columns().len()).collect(),
                Projection::Columns(names) => names
                    .iter()
                    .map(|column| {
                        relation.column_index(column).ok_or_else(|| SigmaError::UnknownColumn {
                            relation: table.clone(),
                            column: column.clone(),
                        })
                    })
                    .collect::<Result<_, _>>()?,
            };
            let columns = indices
                .iter()
                .map(|&i| relation.columns()[i].name.clone())
                .collect();
            let rows = relation
                .matching(&resolved)
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect();
            Ok(QueryResult::Relation { columns, rows })
        }
        Statement::Delete { table, filter } => {
            let n = instance
                .commit(LogEntry::Delete {
                    relation: table,
                    filter,
                })
                .await?;
            Ok(QueryResult::Ack(format!("DELETE {n}")))
        }
        Statement::ShowTables => {
            let rows = instance
                .relations()?
                .map(|(name, relation)| {
                    vec![
                        Value::Text(name.to_string()),
                        Value::Int(relation.columns().len() as i64),
                        Value::Int(relation.len() as i64),
                    ]
                })
                .collect();
            Ok(QueryResult::Relation {
                columns: vec!["table".into(), "columns".into(), "rows".into()],
                rows,
            })
        }
        Statement::Describe { table } => {
            let rows = instance
                .relation(&table)?
                .columns()
                .iter()
                .map(|c| vec![Value::Text(c.name.clone()), Value::Text(c.ty.to_string())])
                .collect();
            Ok(QueryResult::Relation {
                columns: vec!["column".into(), "type".into()],
                rows,
            })
        }
    }
}

/// Rewrites rows given for an explicit column list into the relation's
/// column order. Every column of the relation must be named exactly once.
fn reorder_rows(
    table: &str,
    relation: &Relation,
    columns: &[String],
    rows: Vec<Vec<Value>>,
) -> Result<Vec<Vec<Value>>, SigmaError> {
    let mut seen = HashSet::new();
    let mut positions = Vec::with_capacity(columns.len());
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(SigmaError::InvalidStatement(format!(
                "column '{column}' listed more than once"
            )));
        }
        let idx = relation
            .column_index(column)
            .ok_or_else(|| SigmaError::UnknownColumn {
                relation: table.to_string(),
                column: column.clone(),
            })?;
        positions.push(idx);
    }
    if let Some(missing) = relation
        .columns()
        .iter()
        .find(|c| !seen.contains(c.name.as_str()))
    {
        return Err(SigmaError::InvalidStatement(format!(
            "no value given for column '{}'",
            missing.name
        )));
    }

    rows.into_iter()
        .map(|row| {
            if row.len() != positions.len() {
                return Err(SigmaError::ArityMismatch {
                    expected: positions.len(),
                    found: row.len(),
                });
            }
            let mut ordered = vec![None; positions.len()];
            for (value, &idx) in row.into_iter().zip(&positions) {
                ordered[idx] = Some(value);
            }
            ordered
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| SigmaError::Internal("column position unfilled".into()))
                })
                .collect()
        })
        .collect()
}
