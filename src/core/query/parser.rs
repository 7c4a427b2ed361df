// src/core/query/parser.rs

//! Recursive-descent parser for statements.

use super::ast::{Projection, Statement};
use super::lexer::{Lexer, Token, TokenKind, error_at};
use crate::core::SigmaError;
use crate::core::instance::{ColumnType, Condition, Value};

/// Parses text holding zero or more `;`-terminated statements. The final
/// terminator may be omitted.
pub fn parse(text: &str) -> Result<Vec<Statement>, SigmaError> {
    let mut parser = Parser::new(text)?;
    let mut statements = Vec::new();
    loop {
        while parser.eat(&TokenKind::Semicolon) {}
        if parser.at_eof() {
            return Ok(statements);
        }
        statements.push(parser.statement()?);
        if !parser.at_eof() {
            parser.expect(&TokenKind::Semicolon)?;
        }
    }
}

/// Parses exactly one statement with an optional trailing `;`.
pub fn parse_statement(text: &str) -> Result<Statement, SigmaError> {
    let mut parser = Parser::new(text)?;
    if parser.at_eof() {
        return Err(SigmaError::Parse("empty statement".to_string()));
    }
    let statement = parser.statement()?;
    parser.eat(&TokenKind::Semicolon);
    if !parser.at_eof() {
        let token = parser.peek();
        return Err(error_at(
            token.pos,
            &format!("unexpected {} after statement", token.kind.describe()),
        ));
    }
    Ok(statement)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn new(text: &str) -> Result<Self, SigmaError> {
        Ok(Self {
            tokens: Lexer::new(text).tokenize()?,
            cursor: 0,
        })
    }

    fn peek(&self) -> &Token {
        // `tokenize` always ends with `Eof`, and the cursor never moves past it.
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), SigmaError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> SigmaError {
        let token = self.peek();
        error_at(
            token.pos,
            &format!("expected {expected}, found {}", token.kind.describe()),
        )
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SigmaError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn identifier(&mut self, what: &str) -> Result<String, SigmaError> {
        match &self.peek().kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn statement(&mut self) -> Result<Statement, SigmaError> {
        if self.eat_keyword("CREATE") {
            self.create_table()
        } else if self.eat_keyword("DROP") {
            self.expect_keyword("TABLE")?;
            Ok(Statement::DropTable {
                name: self.identifier("table name")?,
            })
        } else if self.eat_keyword("INSERT") {
            self.insert()
        } else if self.eat_keyword("SELECT") {
            self.select()
        } else if self.eat_keyword("DELETE") {
            self.expect_keyword("FROM")?;
            let table = self.identifier("table name")?;
            let filter = self.where_clause()?;
            Ok(Statement::Delete { table, filter })
        } else if self.eat_keyword("SHOW") {
            self.expect_keyword("TABLES")?;
            Ok(Statement::ShowTables)
        } else if self.eat_keyword("DESCRIBE") {
            Ok(Statement::Describe {
                table: self.identifier("table name")?,
            })
        } else {
            Err(self.unexpected("a statement"))
        }
    }

    fn create_table(&mut self) -> Result<Statement, SigmaError> {
        self.expect_keyword("TABLE")?;
        let name = self.identifier("table name")?;
        self.expect(&TokenKind::LParen)?;
        let mut columns = Vec::new();
        loop {
            let column = self.identifier("column name")?;
            let ty = self.column_type()?;
            columns.push((column, ty));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Statement::CreateTable { name, columns })
    }

    fn column_type(&mut self) -> Result<ColumnType, SigmaError> {
        let ty = if self.is_keyword("INT") || self.is_keyword("INTEGER") {
            ColumnType::Int
        } else if self.is_keyword("TEXT") || self.is_keyword("STRING") {
            ColumnType::Text
        } else if self.is_keyword("BOOL") || self.is_keyword("BOOLEAN") {
            ColumnType::Bool
        } else {
            return Err(self.unexpected("a column type (INT, TEXT or BOOL)"));
        };
        self.advance();
        Ok(ty)
    }

    fn insert(&mut self) -> Result<Statement, SigmaError> {
        self.expect_keyword("INTO")?;
        let table = self.identifier("table name")?;
        let columns = if self.eat(&TokenKind::LParen) {
            let mut columns = vec![self.identifier("column name")?];
            while self.eat(&TokenKind::Comma) {
                columns.push(self.identifier("column name")?);
            }
            self.expect(&TokenKind::RParen)?;
            Some(columns)
        } else {
            None
        };
        self.expect_keyword("VALUES")?;
        let mut rows = Vec::new();
        loop {
            self.expect(&TokenKind::LParen)?;
            let mut row = vec![self.literal()?];
            while self.eat(&TokenKind::Comma) {
                row.push(self.literal()?);
            }
            self.expect(&TokenKind::RParen)?;
            rows.push(row);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(Statement::Insert {
            table,
            columns,
            rows,
        })
    }

    fn select(&mut self) -> Result<Statement, SigmaError> {
        let projection = if self.eat(&TokenKind::Star) {
            Projection::All
        } else {
            let mut columns = vec![self.identifier("column name or '*'")?];
            while self.eat(&TokenKind::Comma) {
                columns.push(self.identifier("column name")?);
            }
            Projection::Columns(columns)
        };
        self.expect_keyword("FROM")?;
        let table = self.identifier("table name")?;
        let filter = self.where_clause()?;
        Ok(Statement::Select {
            table,
            projection,
            filter,
        })
    }

    fn where_clause(&mut self) -> Result<Vec<Condition>, SigmaError> {
        let mut filter = Vec::new();
        if !self.eat_keyword("WHERE") {
            return Ok(filter);
        }
        loop {
            let column = self.identifier("column name")?;
            let op = match self.peek().kind {
                TokenKind::Compare(op) => {
                    self.advance();
                    op
                }
                _ => return Err(self.unexpected("a comparison operator")),
            };
            let value = self.literal()?;
            filter.push(Condition { column, op, value });
            if !self.eat_keyword("AND") {
                return Ok(filter);
            }
        }
    }

    fn literal(&mut self) -> Result<Value, SigmaError> {
        let value = match &self.peek().kind {
            TokenKind::Int(i) => Value::Int(*i),
            TokenKind::Str(s) => Value::Text(s.clone()),
            TokenKind::Ident(s) if s.eq_ignore_ascii_case("TRUE") => Value::Bool(true),
            TokenKind::Ident(s) if s.eq_ignore_ascii_case("FALSE") => Value::Bool(false),
            _ => return Err(self.unexpected("a literal")),
        };
        self.advance();
        Ok(value)
    }
}
