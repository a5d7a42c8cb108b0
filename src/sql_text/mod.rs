//! Lightweight lexical checks on SQL text.
//!
//! The scanner understands quoted literals, quoted identifiers and comments,
//! which is enough to find statement boundaries and placeholders without
//! parsing SQL.

mod parsers;
mod scanner;

use parsers::scan_identifier;
use scanner::{Scanner, Token, scan_digits};

use crate::error::SqlError;

/// Return the one statement in `sql`, without its trailing `;`.
///
/// # Errors
///
/// Returns `SqlError::ExecutionError` if `sql` holds no statement or more than one.
/// Trigger bodies (`BEGIN ...; END`) count as several statements here; run
/// them through the schema scripts instead.
pub fn single_statement(sql: &str) -> Result<&str, SqlError> {
    let mut statements = 0_usize;
    let mut in_statement = false;
    let mut first: Option<(usize, usize)> = None;
    let mut start = 0;

    for token in Scanner::new(sql) {
        match token {
            Token::Code(idx, b';') => {
                if in_statement {
                    statements += 1;
                    if first.is_none() {
                        first = Some((start, idx));
                    }
                    in_statement = false;
                }
            }
            Token::Code(_, b) if b.is_ascii_whitespace() => {}
            Token::Code(idx, _) | Token::Quoted(idx) => {
                if !in_statement {
                    in_statement = true;
                    start = idx;
                }
            }
        }
    }
    if in_statement {
        statements += 1;
        if first.is_none() {
            first = Some((start, sql.len()));
        }
    }

    match (statements, first) {
        (1, Some((begin, end))) => Ok(sql[begin..end].trim_end()),
        (0, _) | (_, None) => Err(SqlError::ExecutionError("no SQL statement supplied".into())),
        (n, _) => Err(SqlError::ExecutionError(format!(
            "expected a single SQL statement, found {n}; multiple statements are not supported"
        ))),
    }
}

/// Number of parameters a statement expects, following `SQLite` numbering:
/// `?` takes the next number, `?NNN` names one explicitly, and each distinct
/// `:name`, `@name` or `$name` takes the next number on first use.
#[must_use]
pub fn placeholder_count(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut highest = 0_usize;
    let mut named: Vec<&str> = Vec::new();

    for token in Scanner::new(sql) {
        let Token::Code(idx, b) = token else {
            continue;
        };
        match b {
            b'?' => match scan_digits(bytes, idx + 1) {
                Some((_, digits)) => {
                    highest = highest.max(digits.parse().unwrap_or(0));
                }
                None => highest += 1,
            },
            b':' | b'@' | b'$' => {
                if let Some((_, name)) = scan_identifier(bytes, idx + 1)
                    && !named.contains(&name)
                {
                    named.push(name);
                    highest += 1;
                }
            }
            _ => {}
        }
    }
    highest
}
