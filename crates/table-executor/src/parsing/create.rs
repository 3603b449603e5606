//! CREATE TABLE statements carried by mint events.
//!
//! The statement names the table `{prefix}_{chain_id}`; the registry assigns
//! the id, and the table is created as `{prefix}_{chain_id}_{table_id}`.

use crate::domain::errors::ParseError;
use crate::parsing::predicate::guard_expr;
use crate::parsing::table_name::{parse_create_name, single_ident, TableName};
use sha2::{Digest, Sha256};
use shared_types::{ChainId, TableId};
use sqlparser::ast::{ColumnOption, CreateTable, Statement, TableConstraint};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

/// A validated CREATE TABLE, not yet bound to a table id.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStmt {
    create: CreateTable,
    prefix: String,
    chain_id: ChainId,
    structure: String,
}

impl CreateStmt {
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Hex sha256 of the `name:TYPE` column list.
    #[must_use]
    pub fn structure_hash(&self) -> String {
        hex::encode(Sha256::digest(self.structure.as_bytes()))
    }

    /// The final table name once the registry assigns `table_id`.
    #[must_use]
    pub fn table_name(&self, table_id: TableId) -> TableName {
        TableName::new(self.prefix.clone(), self.chain_id, table_id)
    }

    /// SQL creating the table under its final name.
    #[must_use]
    pub fn sql_for(&self, table_id: TableId) -> String {
        let mut create = self.create.clone();
        create.name = self.table_name(table_id).to_object_name();
        Statement::CreateTable(create).to_string()
    }
}

/// Parses and validates a CREATE TABLE for `chain_id`.
///
/// # Errors
///
/// [`ParseError`] for anything other than a single plain CREATE TABLE on this
/// chain.
pub fn parse_create(sql: &str, chain_id: ChainId, max_len: usize) -> Result<CreateStmt, ParseError> {
    if sql.len() > max_len {
        return Err(ParseError::TooLong {
            len: sql.len(),
            max: max_len,
        });
    }

    let mut statements = Parser::parse_sql(&SQLiteDialect {}, sql)?;
    if statements.len() != 1 {
        return Err(ParseError::InvalidCreate(
            "exactly one statement is expected".to_string(),
        ));
    }
    let Statement::CreateTable(create) = statements.remove(0) else {
        return Err(ParseError::InvalidCreate(
            "the statement isn't a CREATE TABLE".to_string(),
        ));
    };

    if create.temporary {
        return Err(ParseError::Disallowed("temporary tables"));
    }
    if create.if_not_exists {
        return Err(ParseError::Disallowed("IF NOT EXISTS"));
    }
    if create.without_rowid {
        return Err(ParseError::Disallowed("WITHOUT ROWID"));
    }
    if create.query.is_some() {
        return Err(ParseError::Disallowed("CREATE TABLE ... AS SELECT"));
    }
    if create.columns.is_empty() {
        return Err(ParseError::InvalidCreate("a table needs at least one column".to_string()));
    }

    let (prefix, found) = parse_create_name(&single_ident(&create.name)?)?;
    if found != chain_id {
        return Err(ParseError::ChainMismatch {
            found,
            expected: chain_id,
        });
    }

    for column in &create.columns {
        for def in &column.options {
            match &def.option {
                ColumnOption::ForeignKey { .. } => {
                    return Err(ParseError::Disallowed("foreign keys"));
                }
                ColumnOption::Default(expr) | ColumnOption::Check(expr) => guard_expr(expr)?,
                _ => {}
            }
        }
    }
    for constraint in &create.constraints {
        match constraint {
            TableConstraint::ForeignKey { .. } => return Err(ParseError::Disallowed("foreign keys")),
            TableConstraint::Check { expr, .. } => guard_expr(expr)?,
            _ => {}
        }
    }

    let structure = create
        .columns
        .iter()
        .map(|c| {
            format!(
                "{}:{}",
                c.name.value.to_ascii_lowercase(),
                c.data_type.to_string().to_ascii_uppercase()
            )
        })
        .collect::<Vec<_>>()
        .join(",");

    Ok(CreateStmt {
        create,
        prefix,
        chain_id,
        structure,
    })
}
