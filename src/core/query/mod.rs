// src/core/query/mod.rs

//! The query language: lexer, parser and statement types.
//!
//! Parsing is pure and re-entrant; the only state a caller carries between
//! calls is the text it has not yet handed over (see
//! [`QueryCodec`](crate::core::protocol::QueryCodec)).

pub mod ast;
mod lexer;
mod parser;

pub use ast::{Projection, Statement};
pub use parser::{parse, parse_statement};
