//! Tokenizer for the statement grammar of §6.

use crate::error::{AdvisorError, Result};

/// Lexical tokens of the CQL-like statement grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Select,
    From,
    Where,
    Order,
    By,
    Limit,
    Update,
    Insert,
    Into,
    Delete,
    Set,
    And,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    Comma,
    Dot,
    Star,
    Placeholder,

    Identifier(String),
    IntegerLit(i64),
    FloatLit(f64),
    StringLit(String),

    Eof,
}

struct TokenAt {
    token: Token,
    pos: usize,
}

/// Converts `source` into a token stream, reporting the byte offset of any
/// unrecognized character (`AdvisorError::ParseFailed`).
pub fn tokenize(source: &str) -> Result<Vec<(Token, usize)>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let start = i;
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '\'' {
            i += 1;
            let lit_start = i;
            while i < chars.len() && chars[i] != '\'' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(AdvisorError::ParseFailed {
                    pos: start,
                    reason: "unterminated string literal".into(),
                });
            }
            let value: String = chars[lit_start..i].iter().collect();
            i += 1;
            tokens.push((Token::StringLit(value), start));
            continue;
        }

        if c.is_ascii_digit() {
            let mut is_float = false;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                if chars[i] == '.' {
                    is_float = true;
                }
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            if is_float {
                let v: f64 = text.parse().map_err(|_| AdvisorError::ParseFailed {
                    pos: start,
                    reason: format!("invalid float literal '{text}'"),
                })?;
                tokens.push((Token::FloatLit(v), start));
            } else {
                let v: i64 = text.parse().map_err(|_| AdvisorError::ParseFailed {
                    pos: start,
                    reason: format!("invalid integer literal '{text}'"),
                })?;
                tokens.push((Token::IntegerLit(v), start));
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let token = match word.to_ascii_uppercase().as_str() {
                "SELECT" => Token::Select,
                "FROM" => Token::From,
                "WHERE" => Token::Where,
                "ORDER" => Token::Order,
                "BY" => Token::By,
                "LIMIT" => Token::Limit,
                "UPDATE" => Token::Update,
                "INSERT" => Token::Insert,
                "INTO" => Token::Into,
                "DELETE" => Token::Delete,
                "SET" => Token::Set,
                "AND" => Token::And,
                _ => Token::Identifier(word),
            };
            tokens.push((token, start));
            continue;
        }

        let token = match c {
            '*' => {
                i += 1;
                Token::Star
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '.' => {
                i += 1;
                Token::Dot
            }
            '?' => {
                i += 1;
                Token::Placeholder
            }
            '=' => {
                i += 1;
                Token::Eq
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                i += 2;
                Token::Ne
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                i += 2;
                Token::Le
            }
            '<' if chars.get(i + 1) == Some(&'>') => {
                i += 2;
                Token::Ne
            }
            '<' => {
                i += 1;
                Token::Lt
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                i += 2;
                Token::Ge
            }
            '>' => {
                i += 1;
                Token::Gt
            }
            other => {
                return Err(AdvisorError::ParseFailed {
                    pos: start,
                    reason: format!("unexpected character '{other}'"),
                });
            }
        };
        tokens.push((token, start));
    }

    tokens.push((Token::Eof, chars.len()));
    Ok(tokens)
}

pub(crate) type Tokens = Vec<(Token, usize)>;
