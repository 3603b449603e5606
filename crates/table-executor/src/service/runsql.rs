//! `RunSql` events: parsing, authorization, execution and post-write checks.

use super::txn_scope::TxnScope;
use crate::domain::errors::{EventError, ExecutionError, ParseError, PolicyError};
use crate::domain::policy::{Policy, PolicyData};
use crate::parsing::grant::GrantKind;
use crate::parsing::table_name::TableName;
use crate::parsing::validator::ValidatedWrite;
use crate::parsing::{parse_mutating, MutatingStmt};
use crate::ports::outbound::{Acl, SystemStore};
use shared_types::{Address, TableId};
use tracing::debug;

impl<A: Acl, S: SystemStore> TxnScope<'_, A, S> {
    pub(super) fn run_sql(
        &self,
        caller: &Address,
        is_owner: bool,
        table_id: &TableId,
        statement: &str,
        policy: &PolicyData,
    ) -> Result<(), EventError> {
        let config = &self.inner.config;
        let statements = parse_mutating(
            statement,
            config.chain_id,
            config.query_constraints.max_write_query_size,
        )?;
        for stmt in &statements {
            let found = stmt.table().table_id();
            if found != *table_id {
                return Err(ParseError::TableMismatch {
                    found,
                    expected: *table_id,
                }
                .into());
            }
        }

        let record = self.require_table(table_id)?;
        let table = TableName::new(record.prefix, config.chain_id, *table_id);
        let max_row_count = config.max_row_count_for(table_id);
        let before = if max_row_count > 0 {
            self.inner.system.row_count(self.conn, &table)?
        } else {
            0
        };

        // A controller replaces ACL checks with the event's policy.
        let policy = self
            .inner
            .system
            .controller(self.conn, table_id)?
            .map(|_| Policy::try_from(policy));

        for stmt in statements {
            match stmt {
                MutatingStmt::Grant(grant) => {
                    if !is_owner {
                        return Err(ExecutionError::NonOwnerGrant.into());
                    }
                    match grant.kind() {
                        GrantKind::Grant => self.inner.acl.grant(
                            self.conn,
                            table_id,
                            grant.roles(),
                            grant.privileges(),
                            self.height,
                        )?,
                        GrantKind::Revoke => self.inner.acl.revoke(
                            self.conn,
                            table_id,
                            grant.roles(),
                            grant.privileges(),
                            self.height,
                        )?,
                    }
                }
                MutatingStmt::Write(write) => {
                    let validated = match &policy {
                        Some(Ok(policy)) => write.apply_policy(policy)?,
                        Some(Err(invalid)) => {
                            return Err(PolicyError::Invalid(invalid.clone()).into());
                        }
                        None if is_owner => write.unconstrained(),
                        None => {
                            if !self.inner.acl.check_privileges(
                                self.conn,
                                table_id,
                                caller,
                                write.operation(),
                            )? {
                                return Err(ExecutionError::NotEnoughPrivileges.into());
                            }
                            write.unconstrained()
                        }
                    };

                    let affected = self.execute_write(&validated)?;
                    debug!(operation = %validated.operation(), table = %table, affected, "write applied");

                    if max_row_count > 0 {
                        let after = self.inner.system.row_count(self.conn, &table)?;
                        if after > max_row_count {
                            return Err(ExecutionError::RowCountExceeded { before, after }.into());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Executes a write and returns the number of affected rows. Audited
    /// writes collect the touched rowids and recount them under the check.
    fn execute_write(&self, write: &ValidatedWrite) -> Result<u64, EventError> {
        let sql = write.sql();
        if write.audit().is_none() {
            let affected = self
                .conn
                .execute(&sql, [])
                .map_err(EventError::from_user_sql)?;
            return Ok(affected as u64);
        }

        let rowids = {
            let mut stmt = self.conn.prepare(&sql).map_err(EventError::from_user_sql)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, i64>(0))
                .map_err(EventError::from_user_sql)?;
            let rowids: Vec<i64> = rows
                .collect::<Result<_, _>>()
                .map_err(EventError::from_user_sql)?;
            rowids
        };
        let affected = rowids.len() as u64;

        let audited = match write.audit_sql(&rowids) {
            Some(query) => {
                let count: i64 = self
                    .conn
                    .query_row(&query, [], |row| row.get(0))
                    .map_err(EventError::from_user_sql)?;
                u64::try_from(count).unwrap_or_default()
            }
            None => 0,
        };

        if affected != audited {
            return Err(ExecutionError::AuditMismatch { affected, audited }.into());
        }
        Ok(affected)
    }
}
