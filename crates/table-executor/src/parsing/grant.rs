//! GRANT/REVOKE statements.
//!
//! ```text
//! GRANT  priv [, priv]* ON table TO   'address' [, 'address']*
//! REVOKE priv [, priv]* ON table FROM 'address' [, 'address']*
//! ```
//!
//! Grantees are quoted account addresses, which the generic SQL grammar does
//! not accept, so these are parsed directly from the token stream.

use crate::domain::errors::ParseError;
use crate::domain::privileges::{Privilege, Privileges};
use crate::parsing::table_name::TableName;
use shared_types::Address;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    Grant,
    Revoke,
}

/// A parsed GRANT or REVOKE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantStmt {
    kind: GrantKind,
    table: TableName,
    privileges: Privileges,
    roles: Vec<Address>,
}

impl GrantStmt {
    #[must_use]
    pub fn kind(&self) -> GrantKind {
        self.kind
    }

    #[must_use]
    pub fn table(&self) -> &TableName {
        &self.table
    }

    #[must_use]
    pub fn privileges(&self) -> Privileges {
        self.privileges
    }

    #[must_use]
    pub fn roles(&self) -> &[Address] {
        &self.roles
    }
}

/// Whether the first significant token starts a GRANT or REVOKE.
pub(crate) fn starts_grant(tokens: &[Token]) -> bool {
    matches!(
        tokens.iter().find(|t| !matches!(t, Token::Whitespace(_))),
        Some(Token::Word(w)) if w.keyword == Keyword::GRANT || w.keyword == Keyword::REVOKE
    )
}

pub(crate) fn parse_grant(tokens: &[Token]) -> Result<GrantStmt, ParseError> {
    let mut cursor = Cursor::new(tokens);

    let kind = match cursor.next() {
        Some(Token::Word(w)) if w.keyword == Keyword::GRANT => GrantKind::Grant,
        Some(Token::Word(w)) if w.keyword == Keyword::REVOKE => GrantKind::Revoke,
        _ => return Err(invalid("expected GRANT or REVOKE")),
    };

    let mut privileges = Privileges::NONE;
    loop {
        let privilege = match cursor.next() {
            Some(Token::Word(w)) => w.value.parse::<Privilege>().map_err(ParseError::InvalidGrant)?,
            _ => return Err(invalid("expected a privilege")),
        };
        privileges = privileges.union(privilege.into());
        if !cursor.consume_comma() {
            break;
        }
    }

    cursor.expect_keyword(Keyword::ON)?;

    let table = match cursor.next() {
        Some(Token::Word(w)) => TableName::parse(&w.value)?,
        _ => return Err(invalid("expected a table name")),
    };

    let direction = match kind {
        GrantKind::Grant => Keyword::TO,
        GrantKind::Revoke => Keyword::FROM,
    };
    cursor.expect_keyword(direction)?;

    let mut roles = Vec::new();
    loop {
        let role = match cursor.next() {
            Some(Token::SingleQuotedString(s)) => s
                .parse::<Address>()
                .map_err(|e| ParseError::InvalidGrant(e.to_string()))?,
            _ => return Err(invalid("expected a quoted address")),
        };
        if !roles.contains(&role) {
            roles.push(role);
        }
        if !cursor.consume_comma() {
            break;
        }
    }

    if cursor.next().is_some() {
        return Err(ParseError::TrailingTokens);
    }

    Ok(GrantStmt {
        kind,
        table,
        privileges,
        roles,
    })
}

fn invalid(reason: &str) -> ParseError {
    ParseError::InvalidGrant(reason.to_string())
}

/// Walks significant tokens, skipping whitespace.
struct Cursor<'a> {
    tokens: Vec<&'a Token>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
                .collect(),
            pos: 0,
        }
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    fn consume_comma(&mut self) -> bool {
        if matches!(self.tokens.get(self.pos), Some(Token::Comma)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        match self.next() {
            Some(Token::Word(w)) if w.keyword == keyword => Ok(()),
            _ => Err(ParseError::InvalidGrant(format!("expected {keyword:?}"))),
        }
    }
}
