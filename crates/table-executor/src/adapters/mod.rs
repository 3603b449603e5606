//! # Adapters
//!
//! `SQLite` implementations of the outbound ports.
//!
//! - `schema` - System tables and connection pragmas
//! - `acl` - `system_acl`
//! - `system` - Registry, controllers, receipts, processed height
//! - `state_hash` - Deterministic digest of a chain's tables

pub mod acl;
pub(crate) mod schema;
pub(crate) mod state_hash;
pub mod system;

pub use acl::SqliteAcl;
pub use system::SqliteSystemStore;

/// Decoding of persisted system columns.
pub(crate) mod decode {
    use crate::domain::errors::ExecutorError;
    use shared_types::{Address, TableId, TxnHash};

    pub(crate) fn unsigned(value: i64) -> Result<u64, ExecutorError> {
        u64::try_from(value).map_err(|_| ExecutorError::CorruptState(format!("negative value {value}")))
    }

    pub(crate) fn table_id(value: &str) -> Result<TableId, ExecutorError> {
        value
            .parse()
            .map_err(|e| ExecutorError::CorruptState(format!("{e}")))
    }

    pub(crate) fn address(value: &str) -> Result<Address, ExecutorError> {
        value
            .parse()
            .map_err(|e| ExecutorError::CorruptState(format!("{e}")))
    }

    pub(crate) fn txn_hash(value: &str) -> Result<TxnHash, ExecutorError> {
        value
            .parse()
            .map_err(|e| ExecutorError::CorruptState(format!("{e}")))
    }
}
