// src/core/query/lexer.rs

//! Lexer (tokenizer) for statement text.

use crate::core::SigmaError;
use crate::core::instance::CompareOp;

/// Token types. Keywords are lexed as identifiers and recognized by the
/// parser case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Str(String),
    LParen,
    RParen,
    Comma,
    Star,
    Semicolon,
    Compare(CompareOp),
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("'{s}'"),
            TokenKind::Int(i) => format!("'{i}'"),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Compare(op) => format!("'{op}'"),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based character position in the statement text.
    pub pos: usize,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            pos: 0,
        }
    }

    /// Tokenizes the whole input, ending with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SigmaError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.pos += 1;
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn next_token(&mut self) -> Result<Token, SigmaError> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        let start = self.pos + 1;
        let Some(c) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: start,
            });
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '*' => TokenKind::Star,
            ';' => TokenKind::Semicolon,
            '=' => TokenKind::Compare(CompareOp::Eq),
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Compare(CompareOp::NotEq)
                } else {
                    return Err(error_at(start, "expected '=' after '!'"));
                }
            }
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    TokenKind::Compare(CompareOp::LtEq)
                }
                Some('>') => {
                    self.bump();
                    TokenKind::Compare(CompareOp::NotEq)
                }
                _ => TokenKind::Compare(CompareOp::Lt),
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Compare(CompareOp::GtEq)
                } else {
                    TokenKind::Compare(CompareOp::Gt)
                }
            }
            '\'' => TokenKind::Str(self.string_literal(start)?),
            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                let digits = self.take_while(|c| c.is_ascii_digit());
                TokenKind::Int(parse_int(&format!("-{digits}"), start)?)
            }
            c if c.is_ascii_digit() => {
                let mut digits = c.to_string();
                digits.push_str(&self.take_while(|c| c.is_ascii_digit()));
                TokenKind::Int(parse_int(&digits, start)?)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = c.to_string();
                ident.push_str(&self.take_while(|c| c.is_ascii_alphanumeric() || c == '_'));
                TokenKind::Ident(ident)
            }
            other => {
                return Err(error_at(start, &format!("unexpected character '{other}'")));
            }
        };
        Ok(Token { kind, pos: start })
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    /// Reads the rest of a single-quoted literal. `''` stands for one quote.
    fn string_literal(&mut self, start: usize) -> Result<String, SigmaError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\'') => {
                    if self.peek() == Some('\'') {
                        self.bump();
                        out.push('\'');
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => out.push(c),
                None => return Err(error_at(start, "unterminated string literal")),
            }
        }
    }
}

fn parse_int(digits: &str, pos: usize) -> Result<i64, SigmaError> {
    digits
        .parse::<i64>()
        .map_err(|_| error_at(pos, &format!("integer '{digits}' is out of range")))
}

pub(super) fn error_at(pos: usize, message: &str) -> SigmaError {
    SigmaError::Parse(format!("{message} at position {pos}"))
}
