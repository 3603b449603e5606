//! User table naming: `{prefix}_{chain_id}_{table_id}`.

use crate::domain::errors::ParseError;
use shared_types::{ChainId, TableId};
use sqlparser::ast::{Ident, ObjectName, ObjectNamePart};
use std::fmt;

/// Prefixes that would shadow engine or SQLite internals.
const RESERVED_PREFIXES: &[&str] = &["sqlite_", "system_"];
const RESERVED_NAMES: &[&str] = &["registry", "system"];

/// A fully-qualified user table reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    prefix: String,
    chain_id: ChainId,
    table_id: TableId,
}

impl TableName {
    #[must_use]
    pub fn new(prefix: impl Into<String>, chain_id: ChainId, table_id: TableId) -> Self {
        Self {
            prefix: prefix.into(),
            chain_id,
            table_id,
        }
    }

    /// Parses `{prefix}_{chain_id}_{table_id}`; the prefix may itself
    /// contain underscores or be empty.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidTableName`] when the shape does not match.
    pub fn parse(name: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidTableName(name.to_string());
        let mut parts = name.rsplitn(3, '_');
        let table_id = parts.next().ok_or_else(invalid)?;
        let chain_id = parts.next().ok_or_else(invalid)?;
        let prefix = parts.next().ok_or_else(invalid)?;

        let table_id: TableId = table_id.parse().map_err(|_| invalid())?;
        let chain_id = parse_chain_id(chain_id).ok_or_else(invalid)?;
        validate_prefix(prefix).map_err(|_| invalid())?;

        Ok(Self {
            prefix: prefix.to_string(),
            chain_id,
            table_id,
        })
    }

    /// Parses a single-part SQL object name.
    pub fn from_object_name(name: &ObjectName) -> Result<Self, ParseError> {
        Self::parse(&single_ident(name)?)
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// The name as a one-part SQL object name.
    #[must_use]
    pub fn to_object_name(&self) -> ObjectName {
        ObjectName(vec![ObjectNamePart::Identifier(Ident::new(self.to_string()))])
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.prefix, self.chain_id, self.table_id)
    }
}

/// Parses the `{prefix}_{chain_id}` name used by CREATE statements.
pub(crate) fn parse_create_name(name: &str) -> Result<(String, ChainId), ParseError> {
    let invalid = || ParseError::InvalidCreate(format!("table name {name} must be {{prefix}}_{{chain_id}}"));
    let (prefix, chain_id) = name.rsplit_once('_').ok_or_else(invalid)?;
    let chain_id = parse_chain_id(chain_id).ok_or_else(invalid)?;
    validate_prefix(prefix)?;
    Ok((prefix.to_string(), chain_id))
}

/// Extracts the identifier of a one-part object name.
pub(crate) fn single_ident(name: &ObjectName) -> Result<String, ParseError> {
    match name.0.as_slice() {
        [ObjectNamePart::Identifier(ident)] => Ok(ident.value.clone()),
        _ => Err(ParseError::InvalidTableName(name.to_string())),
    }
}

fn parse_chain_id(text: &str) -> Option<ChainId> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<i64>().ok().map(ChainId)
}

fn validate_prefix(prefix: &str) -> Result<(), ParseError> {
    let lower = prefix.to_ascii_lowercase();
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        || prefix.starts_with(|c: char| c.is_ascii_digit())
        || RESERVED_PREFIXES.iter().any(|p| lower.starts_with(p))
        || RESERVED_NAMES.contains(&lower.as_str())
    {
        return Err(ParseError::InvalidCreate(format!("prefix {prefix} is not allowed")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_underscored_prefix() {
        let name = TableName::parse("my_nice_table_1337_100").unwrap();
        assert_eq!(name.prefix(), "my_nice_table");
        assert_eq!(name.chain_id(), ChainId(1337));
        assert_eq!(name.table_id(), TableId::from(100u64));
        assert_eq!(name.to_string(), "my_nice_table_1337_100");
    }

    #[test]
    fn test_parse_empty_prefix() {
        let name = TableName::parse("_1337_2").unwrap();
        assert_eq!(name.prefix(), "");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for bad in ["foo", "foo_1337", "foo_x_1", "foo_1_x", "system_acl_1_1", "registry_1_1", "sqlite_master_1_1"] {
            assert!(TableName::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_create_name() {
        assert_eq!(
            parse_create_name("foo_1337").unwrap(),
            ("foo".to_string(), ChainId(1337))
        );
        assert!(parse_create_name("foo").is_err());
        assert!(parse_create_name("system_1337").is_err());
    }
}
