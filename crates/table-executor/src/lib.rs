//! # Table Executor
//!
//! Applies the registry events of one chain to a `SQLite` database. Tables
//! are minted, written to, and access-controlled through events observed on
//! chain; the executor turns each block of events into exactly one database
//! transaction.
//!
//! ## Atomicity
//!
//! ```text
//! block (BlockScope) ── BEGIN IMMEDIATE ... COMMIT
//!   ├── txn 0 (TxnScope) ── SAVEPOINT ... RELEASE
//!   │     ├── event 0: CreateTable
//!   │     └── event 1: RunSql ── parse → authorize → rewrite → execute → audit
//!   └── txn 1 (TxnScope) ── SAVEPOINT ... ROLLBACK TO (recoverable failure)
//! ```
//!
//! A recoverable failure reverts one chain transaction and is recorded in its
//! receipt. Infrastructure failures surface as [`ExecutorError`] and leave the
//! block uncommitted.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Single Scope | At most one block scope is open per executor |
//! | 2 | Monotonic Height | Committed heights strictly increase |
//! | 3 | Txn Atomicity | All events of a chain transaction apply, or none |
//! | 4 | Deterministic SQL | Writes cannot call non-deterministic functions or read other tables |
//! | 5 | Table Isolation | A `RunSql` event only touches the table it names |
//! | 6 | Row Limit | Tables never exceed their configured maximum row count |
//! | 7 | Policy Audit | Rows written under `with_check` satisfy the check |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Events, policies, privileges, configuration and errors
//! - `parsing/` - SQL validation and rewriting
//! - `ports/` - Inbound API and outbound persistence traits
//! - `adapters/` - `SQLite` implementations of the outbound ports
//! - `service/` - Executor, block scope and transaction scope
//!
//! ## Usage
//!
//! ```ignore
//! use table_executor::prelude::*;
//!
//! let executor = Executor::open("tables.db", ExecutorConfig::new(ChainId(1337)))?;
//! let mut scope = executor.new_block_scope(100)?;
//! let result = scope.execute_txn_events(&txn)?;
//! scope.save_txn_receipts(&[Receipt::new(ChainId(1337), 100, 0, txn.txn_hash, &result)])?;
//! scope.commit()?;
//! ```

pub mod adapters;
pub mod domain;
pub mod parsing;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::{SqliteAcl, SqliteSystemStore};
pub use domain::config::ExecutorConfig;
pub use domain::entities::{
    AclEntry, Event, Receipt, StateHash, TableRecord, TxnEvents, TxnExecutionResult,
};
pub use domain::errors::{
    ConfigError, ExecutionError, ExecutorError, ParseError, PolicyError,
};
pub use domain::policy::{InvalidPolicy, Policy, PolicyData};
pub use domain::privileges::{Operation, Privilege, Privileges};
pub use ports::inbound::{BlockScopeApi, ExecutorApi};
pub use ports::outbound::{Acl, SystemStore};
pub use service::{BlockScope, Executor, ExecutorDependencies};

/// Everything needed to drive an executor.
pub mod prelude {
    pub use crate::domain::config::ExecutorConfig;
    pub use crate::domain::entities::{Event, Receipt, StateHash, TxnEvents, TxnExecutionResult};
    pub use crate::domain::errors::{ExecutionError, ExecutorError};
    pub use crate::domain::policy::PolicyData;
    pub use crate::domain::privileges::{Privilege, Privileges};
    pub use crate::ports::inbound::{BlockScopeApi, ExecutorApi};
    pub use crate::service::{BlockScope, Executor};
    pub use shared_types::{Address, ChainId, TableId, TxnHash};
}
