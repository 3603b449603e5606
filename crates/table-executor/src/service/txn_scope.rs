//! Transaction-level savepoint and per-event dispatch.

use super::Inner;
use crate::domain::entities::{Event, TableRecord, TxnEvents, TxnExecutionResult};
use crate::domain::errors::{EventError, ExecutionError, ExecutorError};
use crate::parsing::create::parse_create;
use crate::ports::outbound::{Acl, SystemStore};
use rusqlite::Connection;
use shared_types::{Address, TableId};
use tracing::{debug, info, warn};

/// Applies the events of one chain transaction inside `SAVEPOINT txn_scope`.
pub(crate) struct TxnScope<'a, A, S> {
    pub(super) conn: &'a Connection,
    pub(super) inner: &'a Inner<A, S>,
    pub(super) height: u64,
}

impl<'a, A: Acl, S: SystemStore> TxnScope<'a, A, S> {
    pub(crate) fn new(conn: &'a Connection, inner: &'a Inner<A, S>, height: u64) -> Self {
        Self {
            conn,
            inner,
            height,
        }
    }

    /// Runs every event in order. The first recoverable failure reverts all
    /// of the transaction's effects and is reported in the result.
    pub(crate) fn execute(&self, txn: &TxnEvents) -> Result<TxnExecutionResult, ExecutorError> {
        self.conn.execute_batch("SAVEPOINT txn_scope")?;

        let mut result = TxnExecutionResult::default();
        for (index, event) in txn.events.iter().enumerate() {
            result.table_id = Some(event.table_id());
            debug!(index, kind = event.kind(), table_id = %event.table_id(), "applying event");

            match self.apply_event(event) {
                Ok(()) => {}
                Err(EventError::Rejected(err)) => {
                    self.conn
                        .execute_batch("ROLLBACK TO txn_scope; RELEASE txn_scope")?;
                    info!(index, kind = event.kind(), error = %err, "transaction reverted");
                    result.error = Some(err.to_string());
                    result.error_event_index = Some(index);
                    return Ok(result);
                }
                Err(EventError::Fatal(err)) => {
                    if let Err(rollback) = self
                        .conn
                        .execute_batch("ROLLBACK TO txn_scope; RELEASE txn_scope")
                    {
                        warn!(error = %rollback, "savepoint rollback after fatal error");
                    }
                    return Err(err);
                }
            }
        }

        self.conn.execute_batch("RELEASE txn_scope")?;
        Ok(result)
    }

    fn apply_event(&self, event: &Event) -> Result<(), EventError> {
        match event {
            Event::CreateTable {
                owner,
                table_id,
                statement,
            } => self.create_table(owner, table_id, statement),
            Event::RunSql {
                caller,
                is_owner,
                table_id,
                statement,
                policy,
            } => self.run_sql(caller, *is_owner, table_id, statement, policy),
            Event::SetController {
                table_id,
                controller,
            } => {
                self.require_table(table_id)?;
                self.inner
                    .system
                    .set_controller(self.conn, table_id, controller)?;
                Ok(())
            }
            Event::Grant {
                table_id,
                grantees,
                privileges,
                ..
            } => {
                self.require_table(table_id)?;
                self.inner
                    .acl
                    .grant(self.conn, table_id, grantees, *privileges, self.height)?;
                Ok(())
            }
            Event::Revoke {
                table_id,
                grantees,
                privileges,
            } => {
                self.require_table(table_id)?;
                self.inner
                    .acl
                    .revoke(self.conn, table_id, grantees, *privileges, self.height)?;
                Ok(())
            }
        }
    }

    fn create_table(&self, owner: &Address, table_id: &TableId, statement: &str) -> Result<(), EventError> {
        let config = &self.inner.config;
        let create = parse_create(
            statement,
            config.chain_id,
            config.query_constraints.max_write_query_size,
        )?;

        if self.inner.system.table(self.conn, table_id)?.is_some() {
            return Err(ExecutionError::TableAlreadyExists(*table_id).into());
        }

        self.conn
            .execute_batch(&create.sql_for(*table_id))
            .map_err(EventError::from_user_sql)?;

        let record = TableRecord {
            chain_id: config.chain_id,
            table_id: *table_id,
            owner: *owner,
            prefix: create.prefix().to_string(),
            structure: create.structure_hash(),
            created_at: self.height,
        };
        self.inner.system.register_table(self.conn, &record)?;
        info!(table = %record.name(), owner = %owner, "table created");
        Ok(())
    }

    pub(super) fn require_table(&self, table_id: &TableId) -> Result<TableRecord, EventError> {
        self.inner
            .system
            .table(self.conn, table_id)?
            .ok_or_else(|| ExecutionError::TableNotFound(*table_id).into())
    }
}
