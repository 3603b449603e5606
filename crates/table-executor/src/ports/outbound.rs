//! # Outbound Ports (Driven Ports)
//!
//! Persistence the executor depends on. Every method runs on the connection
//! of the enclosing block transaction, so writes become visible only when the
//! block scope commits.
//!
//! Production: `SqliteAcl` / `SqliteSystemStore` (adapters/).

use crate::domain::entities::{AclEntry, Receipt, StateHash, TableRecord};
use crate::domain::errors::ExecutorError;
use crate::domain::privileges::{Operation, Privileges};
use crate::parsing::table_name::TableName;
use rusqlite::Connection;
use shared_types::{Address, TableId, TxnHash};

/// Privileges granted to controllers on tables.
///
/// ## Invariants
///
/// - grant is set union, revoke is set difference; never negative
/// - an empty set is logically absent
pub trait Acl: Send + Sync {
    /// Privileges of `controller` on `table_id`; empty when no entry exists.
    fn privileges(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controller: &Address,
    ) -> Result<Privileges, ExecutorError>;

    /// Full ACL entry, if any.
    fn entry(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controller: &Address,
    ) -> Result<Option<AclEntry>, ExecutorError>;

    /// Adds `privileges` to each controller's set.
    fn grant(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controllers: &[Address],
        privileges: Privileges,
        height: u64,
    ) -> Result<(), ExecutorError>;

    /// Removes `privileges` from each controller's set.
    fn revoke(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controllers: &[Address],
        privileges: Privileges,
        height: u64,
    ) -> Result<(), ExecutorError>;

    /// Whether `controller` may run `operation` on `table_id`.
    fn check_privileges(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controller: &Address,
        operation: Operation,
    ) -> Result<bool, ExecutorError> {
        Ok(self
            .privileges(conn, table_id, controller)?
            .contains(operation.required_privilege()))
    }
}

/// Registry, controllers, receipts and block bookkeeping.
pub trait SystemStore: Send + Sync {
    /// Creates the system tables if missing.
    fn install(&self, conn: &Connection) -> Result<(), ExecutorError>;

    fn table(&self, conn: &Connection, table_id: &TableId) -> Result<Option<TableRecord>, ExecutorError>;

    fn register_table(&self, conn: &Connection, record: &TableRecord) -> Result<(), ExecutorError>;

    /// Controller of a table; `None` when unset.
    fn controller(&self, conn: &Connection, table_id: &TableId) -> Result<Option<Address>, ExecutorError>;

    /// Upserts the controller; the zero address removes it.
    fn set_controller(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controller: &Address,
    ) -> Result<(), ExecutorError>;

    /// Live row count of a user table.
    fn row_count(&self, conn: &Connection, table: &TableName) -> Result<u64, ExecutorError>;

    fn last_processed_height(&self, conn: &Connection) -> Result<Option<u64>, ExecutorError>;

    fn set_last_processed_height(&self, conn: &Connection, height: u64) -> Result<(), ExecutorError>;

    fn save_receipts(&self, conn: &Connection, receipts: &[Receipt]) -> Result<(), ExecutorError>;

    fn receipt_exists(&self, conn: &Connection, txn_hash: &TxnHash) -> Result<bool, ExecutorError>;

    fn receipt(&self, conn: &Connection, txn_hash: &TxnHash) -> Result<Option<Receipt>, ExecutorError>;

    /// Digest over the registry, controllers, ACL and every user table.
    fn state_hash(&self, conn: &Connection) -> Result<StateHash, ExecutorError>;
}
