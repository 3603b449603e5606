//! # Write Statement Validation
//!
//! Structural checks applied to every INSERT/UPDATE/DELETE, and the policy
//! rewriting applied to statements submitted by a table's controller.
//!
//! All rewriting happens on the sqlparser AST; the executed SQL is the
//! rendering of the (possibly rewritten) tree, never a string splice.

use crate::domain::errors::{ParseError, PolicyError};
use crate::domain::policy::Policy;
use crate::domain::privileges::Operation;
use crate::parsing::predicate::{guard_expr, Predicate};
use crate::parsing::table_name::{single_ident, TableName};
use sqlparser::ast::{
    AssignmentTarget, BinaryOperator, Expr, FromTable, Ident, SelectItem, SetExpr, Statement,
    TableFactor, TableObject, TableWithJoins,
};

/// A structurally valid write statement against one user table.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStmt {
    statement: Statement,
    operation: Operation,
    table: TableName,
}

impl WriteStmt {
    /// Accepts INSERT ... VALUES, single-table UPDATE and single-table DELETE.
    ///
    /// # Errors
    ///
    /// [`ParseError`] naming the first disallowed construct.
    pub fn from_statement(statement: Statement) -> Result<Self, ParseError> {
        let (operation, table) = match &statement {
            Statement::Insert(insert) => {
                if insert.or.is_some() || insert.replace_into || insert.ignore {
                    return Err(ParseError::Disallowed("conflict resolution clause"));
                }
                if insert.on.is_some() {
                    return Err(ParseError::Disallowed("upsert clause"));
                }
                if insert.returning.is_some() {
                    return Err(ParseError::Disallowed("RETURNING clause"));
                }
                if !insert.assignments.is_empty() {
                    return Err(ParseError::Disallowed("INSERT ... SET"));
                }
                let TableObject::TableName(name) = &insert.table else {
                    return Err(ParseError::Disallowed("table functions"));
                };
                if let Some(source) = &insert.source {
                    if source.with.is_some() {
                        return Err(ParseError::Disallowed("WITH clause"));
                    }
                    let SetExpr::Values(values) = source.body.as_ref() else {
                        return Err(ParseError::Disallowed("INSERT ... SELECT"));
                    };
                    for expr in values.rows.iter().flatten() {
                        guard_expr(expr)?;
                    }
                }
                (Operation::Insert, TableName::from_object_name(name)?)
            }
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                returning,
                or,
                ..
            } => {
                if or.is_some() {
                    return Err(ParseError::Disallowed("conflict resolution clause"));
                }
                if from.is_some() {
                    return Err(ParseError::Disallowed("UPDATE ... FROM"));
                }
                if returning.is_some() {
                    return Err(ParseError::Disallowed("RETURNING clause"));
                }
                let table = target_table(table)?;
                for assignment in assignments {
                    let AssignmentTarget::ColumnName(column) = &assignment.target else {
                        return Err(ParseError::Disallowed("tuple assignments"));
                    };
                    single_ident(column).map_err(|_| ParseError::Disallowed("qualified column names"))?;
                    guard_expr(&assignment.value)?;
                }
                if let Some(selection) = selection {
                    guard_expr(selection)?;
                }
                (Operation::Update, table)
            }
            Statement::Delete(delete) => {
                if !delete.tables.is_empty() {
                    return Err(ParseError::Disallowed("multi-table DELETE"));
                }
                if delete.using.is_some() {
                    return Err(ParseError::Disallowed("DELETE ... USING"));
                }
                if delete.returning.is_some() {
                    return Err(ParseError::Disallowed("RETURNING clause"));
                }
                if !delete.order_by.is_empty() || delete.limit.is_some() {
                    return Err(ParseError::Disallowed("DELETE ... ORDER BY/LIMIT"));
                }
                let tables = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
                };
                let [table] = tables.as_slice() else {
                    return Err(ParseError::Disallowed("multi-table DELETE"));
                };
                let table = target_table(table)?;
                if let Some(selection) = &delete.selection {
                    guard_expr(selection)?;
                }
                (Operation::Delete, table)
            }
            _ => return Err(ParseError::NotWriteStatement),
        };

        Ok(Self {
            statement,
            operation,
            table,
        })
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Executes as written.
    #[must_use]
    pub fn unconstrained(self) -> ValidatedWrite {
        ValidatedWrite {
            statement: self.statement,
            operation: self.operation,
            table: self.table,
            audit: None,
        }
    }

    /// Applies a controller policy.
    ///
    /// - the operation kind must be allowed,
    /// - UPDATE may only assign `updatable_columns`,
    /// - `where_clause` is conjoined into UPDATE/DELETE targeting,
    /// - `with_check` turns INSERT/UPDATE into an audited statement that
    ///   returns the rowids it touched.
    ///
    /// # Errors
    ///
    /// [`PolicyError`] when the policy forbids the statement.
    pub fn apply_policy(self, policy: &Policy) -> Result<ValidatedWrite, PolicyError> {
        let Self {
            mut statement,
            operation,
            table,
        } = self;

        if !policy.allows(operation) {
            return Err(PolicyError::OperationNotAllowed(operation));
        }

        match &mut statement {
            Statement::Update {
                assignments,
                selection,
                ..
            } => {
                if let Some(allowed) = policy.updatable_columns() {
                    for assignment in assignments.iter() {
                        if let AssignmentTarget::ColumnName(column) = &assignment.target {
                            let column = single_ident(column).unwrap_or_else(|_| column.to_string());
                            if !allowed.contains(&column.to_ascii_lowercase()) {
                                return Err(PolicyError::ColumnNotAllowed(column));
                            }
                        }
                    }
                }
                if let Some(clause) = policy.where_clause() {
                    conjoin(selection, clause.expr());
                }
            }
            Statement::Delete(delete) => {
                if let Some(clause) = policy.where_clause() {
                    conjoin(&mut delete.selection, clause.expr());
                }
            }
            _ => {}
        }

        let audit = match (operation, policy.with_check()) {
            (Operation::Insert | Operation::Update, Some(check)) => {
                set_returning_rowid(&mut statement);
                Some(check.clone())
            }
            _ => None,
        };

        Ok(ValidatedWrite {
            statement,
            operation,
            table,
            audit,
        })
    }
}

/// A write statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedWrite {
    statement: Statement,
    operation: Operation,
    table: TableName,
    audit: Option<Predicate>,
}

impl ValidatedWrite {
    /// SQL text to execute.
    #[must_use]
    pub fn sql(&self) -> String {
        self.statement.to_string()
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// When set, the statement returns touched rowids and must be audited.
    #[must_use]
    pub fn audit(&self) -> Option<&Predicate> {
        self.audit.as_ref()
    }

    /// Counts the given rows that satisfy the audit predicate.
    #[must_use]
    pub fn audit_sql(&self, rowids: &[i64]) -> Option<String> {
        let check = self.audit.as_ref()?;
        if rowids.is_empty() {
            return None;
        }
        let ids = rowids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Some(format!(
            "SELECT count(*) FROM {} WHERE rowid IN ({ids}) AND ({check})",
            self.table
        ))
    }
}

fn target_table(table: &TableWithJoins) -> Result<TableName, ParseError> {
    if !table.joins.is_empty() {
        return Err(ParseError::Disallowed("joins"));
    }
    let TableFactor::Table { name, args, .. } = &table.relation else {
        return Err(ParseError::Disallowed("derived tables"));
    };
    if args.is_some() {
        return Err(ParseError::Disallowed("table functions"));
    }
    TableName::from_object_name(name)
}

fn conjoin(selection: &mut Option<Expr>, predicate: &Expr) {
    let constraint = Expr::Nested(Box::new(predicate.clone()));
    *selection = Some(match selection.take() {
        Some(existing) => Expr::BinaryOp {
            left: Box::new(Expr::Nested(Box::new(existing))),
            op: BinaryOperator::And,
            right: Box::new(constraint),
        },
        None => constraint,
    });
}

fn set_returning_rowid(statement: &mut Statement) {
    let rowid = vec![SelectItem::UnnamedExpr(Expr::Identifier(Ident::new("rowid")))];
    match statement {
        Statement::Insert(insert) => insert.returning = Some(rowid),
        Statement::Update { returning, .. } => *returning = Some(rowid),
        _ => {}
    }
}
