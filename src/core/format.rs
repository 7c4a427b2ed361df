// src/core/format.rs

//! Renders results for people reading a terminal.

use crate::core::instance::Value;
use crate::core::protocol::QueryResult;
use std::fmt::Write;

/// Renders a result as text ending in a newline.
pub fn render(result: &QueryResult) -> String {
    match result {
        QueryResult::Ack(message) => format!("OK {message}\n"),
        QueryResult::Error(message) => format!("ERROR: {message}\n"),
        QueryResult::Relation { columns, rows } => render_table(columns, rows),
    }
}

/// Renders an aligned table followed by a row count, e.g.
///
/// ```text
///  id | name
/// ----+-------
///  1  | Alice
/// (1 row)
/// ```
pub fn render_table(columns: &[String], rows: &[Vec<Value>]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(Value::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_row(&mut out, columns, &widths);
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
    out.push_str(&separator.join("+"));
    out.push('\n');
    for row in &cells {
        write_row(&mut out, row, &widths);
    }
    match rows.len() {
        1 => out.push_str("(1 row)\n"),
        n => {
            let _ = writeln!(out, "({n} rows)");
        }
    }
    out
}

fn write_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!(" {cell:<width$} "))
        .collect();
    out.push_str(padded.join("|").trim_end());
    out.push('\n');
}
