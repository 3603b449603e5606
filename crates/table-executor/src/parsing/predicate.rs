//! Expression-level checks shared by write statements and policy predicates.

use crate::domain::errors::ParseError;
use sqlparser::ast::{Expr, ObjectName, Query, TableFactor, Visit, Visitor};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use std::fmt;
use std::ops::ControlFlow;

/// Functions whose result depends on connection state or the wall clock.
///
/// The date/time family is denied whatever its arguments.
const NON_DETERMINISTIC_FUNCTIONS: &[&str] = &[
    "random",
    "randomblob",
    "changes",
    "last_insert_rowid",
    "total_changes",
    "date",
    "time",
    "datetime",
    "julianday",
    "unixepoch",
    "strftime",
    "timediff",
];

/// Clock keywords, usable with or without a call syntax.
const CLOCK_KEYWORDS: &[&str] = &["current_time", "current_date", "current_timestamp"];

/// A single SQL boolean expression from a controller policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: Expr,
}

impl Predicate {
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

/// Parses `text` as exactly one guarded expression.
///
/// # Errors
///
/// Syntax errors, trailing input, sub-queries and non-deterministic functions.
pub fn parse_predicate(text: &str) -> Result<Predicate, ParseError> {
    let dialect = SQLiteDialect {};
    let mut parser = Parser::new(&dialect).try_with_sql(text)?;
    let expr = parser.parse_expr()?;
    if parser.peek_token().token != Token::EOF {
        return Err(ParseError::TrailingTokens);
    }
    guard_expr(&expr)?;
    Ok(Predicate { expr })
}

/// Rejects sub-queries, relation references and non-deterministic calls
/// anywhere inside `expr`.
pub(crate) fn guard_expr(expr: &Expr) -> Result<(), ParseError> {
    match expr.visit(&mut ExprGuard) {
        ControlFlow::Break(err) => Err(err),
        ControlFlow::Continue(()) => Ok(()),
    }
}

pub(crate) fn is_non_deterministic(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    NON_DETERMINISTIC_FUNCTIONS.contains(&name.as_str()) || is_clock_keyword(&name)
}

fn is_clock_keyword(name: &str) -> bool {
    CLOCK_KEYWORDS.contains(&name.to_ascii_lowercase().as_str())
}

struct ExprGuard;

impl Visitor for ExprGuard {
    type Break = ParseError;

    fn pre_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        ControlFlow::Break(ParseError::SubQuery)
    }

    fn pre_visit_relation(&mut self, _relation: &ObjectName) -> ControlFlow<Self::Break> {
        ControlFlow::Break(ParseError::SubQuery)
    }

    fn pre_visit_table_factor(&mut self, _factor: &TableFactor) -> ControlFlow<Self::Break> {
        ControlFlow::Break(ParseError::SubQuery)
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        let name = match expr {
            Expr::Function(function) => function
                .name
                .0
                .last()
                .map(ToString::to_string)
                .filter(|name| is_non_deterministic(name)),
            Expr::Identifier(ident) if ident.quote_style.is_none() && is_clock_keyword(&ident.value) => {
                Some(ident.value.clone())
            }
            _ => None,
        };
        match name {
            Some(name) => {
                ControlFlow::Break(ParseError::NonDeterministicFunction(name.to_ascii_lowercase()))
            }
            _ => ControlFlow::Continue(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_expression_parses() {
        let predicate = parse_predicate("zar in ('one', 'two')").unwrap();
        assert_eq!(predicate.to_string(), "zar IN ('one', 'two')");
    }

    #[test]
    fn test_trailing_input_is_rejected() {
        assert_eq!(parse_predicate("zar = 'two' zaz"), Err(ParseError::TrailingTokens));
        assert_eq!(parse_predicate("zar = 'two';"), Err(ParseError::TrailingTokens));
    }

    #[test]
    fn test_subqueries_are_rejected() {
        assert_eq!(
            parse_predicate("exists (select 1 from registry)"),
            Err(ParseError::SubQuery)
        );
        assert_eq!(
            parse_predicate("zar in (select zar from foo_1337_2)"),
            Err(ParseError::SubQuery)
        );
    }

    #[test]
    fn test_non_deterministic_functions_are_rejected() {
        assert_eq!(
            parse_predicate("zar > random()"),
            Err(ParseError::NonDeterministicFunction("random".into()))
        );
        assert!(matches!(
            parse_predicate("ts < CURRENT_TIMESTAMP"),
            Err(ParseError::NonDeterministicFunction(_))
        ));
        assert!(parse_predicate("length(zar) > 2").is_ok());
    }

    #[test]
    fn test_clock_functions_are_rejected() {
        for (text, name) in [
            ("zar < datetime('now')", "datetime"),
            ("zar < date()", "date"),
            ("zar < time('now', 'localtime')", "time"),
            ("zar < julianday('now')", "julianday"),
            ("zar < strftime('%s', 'now')", "strftime"),
            ("zar < unixepoch()", "unixepoch"),
            ("zar < DateTime(zar)", "datetime"),
        ] {
            assert_eq!(
                parse_predicate(text),
                Err(ParseError::NonDeterministicFunction(name.into())),
                "{text}"
            );
        }
    }

    #[test]
    fn test_columns_named_like_clock_functions_are_allowed() {
        assert!(parse_predicate("date = 'x' and time > 3").is_ok());
    }
}
