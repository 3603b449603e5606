//! # Statement Parsing
//!
//! Turns the statement text of registry events into typed statements.
//!
//! - `RunSql` text is split on top-level `;` into INSERT/UPDATE/DELETE and
//!   GRANT/REVOKE statements ([`parse_mutating`]).
//! - `CreateTable` text is a single CREATE TABLE ([`create::parse_create`]).
//! - Policy predicates are single expressions ([`predicate::parse_predicate`]).

pub mod create;
pub mod grant;
pub mod predicate;
pub mod table_name;
pub mod validator;

use crate::domain::errors::ParseError;
use grant::GrantStmt;
use shared_types::ChainId;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use table_name::TableName;
use validator::WriteStmt;

/// One statement of a `RunSql` event.
#[derive(Debug, Clone, PartialEq)]
pub enum MutatingStmt {
    Write(WriteStmt),
    Grant(GrantStmt),
}

impl MutatingStmt {
    #[must_use]
    pub fn table(&self) -> &TableName {
        match self {
            Self::Write(w) => w.table(),
            Self::Grant(g) => g.table(),
        }
    }
}

/// Parses the statement text of a `RunSql` event.
///
/// Every statement must name a table of `chain_id`; matching the event's
/// table id is left to the caller.
///
/// # Errors
///
/// The first [`ParseError`] encountered; no partial list is returned.
pub fn parse_mutating(
    sql: &str,
    chain_id: ChainId,
    max_len: usize,
) -> Result<Vec<MutatingStmt>, ParseError> {
    if sql.len() > max_len {
        return Err(ParseError::TooLong {
            len: sql.len(),
            max: max_len,
        });
    }

    let dialect = SQLiteDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize()?;

    let mut statements = Vec::new();
    for chunk in split_statements(tokens) {
        let statement = if grant::starts_grant(&chunk) {
            MutatingStmt::Grant(grant::parse_grant(&chunk)?)
        } else {
            let mut parser = Parser::new(&dialect).with_tokens(chunk);
            let parsed = parser.parse_statement()?;
            if parser.peek_token().token != Token::EOF {
                return Err(ParseError::TrailingTokens);
            }
            MutatingStmt::Write(WriteStmt::from_statement(parsed)?)
        };

        let found = statement.table().chain_id();
        if found != chain_id {
            return Err(ParseError::ChainMismatch {
                found,
                expected: chain_id,
            });
        }
        statements.push(statement);
    }

    if statements.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(statements)
}

/// Splits on top-level semicolons, dropping blank chunks.
fn split_statements(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        if token == Token::SemiColon {
            chunks.push(std::mem::take(&mut current));
        } else {
            current.push(token);
        }
    }
    chunks.push(current);

    chunks
        .into_iter()
        .filter(|chunk| {
            chunk
                .iter()
                .any(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::privileges::Operation;
    use shared_types::TableId;

    const CHAIN: ChainId = ChainId(1337);

    #[test]
    fn test_splits_multiple_statements() {
        let stmts = parse_mutating(
            "insert into foo_1337_100 values ('a;b');update foo_1337_100 set zar = 'c';",
            CHAIN,
            35_000,
        )
        .unwrap();
        assert_eq!(stmts.len(), 2);
        match &stmts[0] {
            MutatingStmt::Write(w) => assert_eq!(w.operation(), Operation::Insert),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(stmts[1].table().table_id(), TableId::from(100u64));
    }

    #[test]
    fn test_mixes_grants_and_writes() {
        let stmts = parse_mutating(
            "grant insert on foo_1337_100 to '0x1'; delete from foo_1337_100",
            CHAIN,
            35_000,
        )
        .unwrap();
        assert!(matches!(stmts[0], MutatingStmt::Grant(_)));
        assert!(matches!(stmts[1], MutatingStmt::Write(_)));
    }

    #[test]
    fn test_rejects_other_chain() {
        assert_eq!(
            parse_mutating("insert into foo_1_100 values (1)", CHAIN, 35_000).unwrap_err(),
            ParseError::ChainMismatch {
                found: ChainId(1),
                expected: CHAIN
            }
        );
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert_eq!(parse_mutating(" ; ;", CHAIN, 35_000).unwrap_err(), ParseError::Empty);
        let sql = "insert into foo_1337_100 values ('one')";
        assert!(matches!(
            parse_mutating(sql, CHAIN, 10).unwrap_err(),
            ParseError::TooLong { max: 10, .. }
        ));
    }

    #[test]
    fn test_rejects_non_write_statements() {
        assert_eq!(
            parse_mutating("select * from foo_1337_100", CHAIN, 35_000).unwrap_err(),
            ParseError::NotWriteStatement
        );
        assert!(parse_mutating("drop table foo_1337_100", CHAIN, 35_000).is_err());
    }
}
