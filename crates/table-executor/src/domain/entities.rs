//! # Domain Entities
//!
//! Registry events, their grouping per chain transaction, and the records the
//! executor produces and persists.

use crate::domain::policy::PolicyData;
use crate::domain::privileges::Privileges;
use serde::{Deserialize, Serialize};
use shared_types::{Address, ChainId, TableId, TxnHash};
use std::fmt;

// =============================================================================
// EVENTS
// =============================================================================

/// A registry event, applied in the order it appears in its transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Mint of a new table.
    CreateTable {
        owner: Address,
        table_id: TableId,
        statement: String,
    },

    /// One or more `;`-separated write statements against a table.
    RunSql {
        caller: Address,
        is_owner: bool,
        table_id: TableId,
        statement: String,
        #[serde(default)]
        policy: PolicyData,
    },

    /// Sets the controller of a table; the zero address removes it.
    SetController { table_id: TableId, controller: Address },

    Grant {
        table_id: TableId,
        grantor: Address,
        grantees: Vec<Address>,
        privileges: Privileges,
    },

    Revoke {
        table_id: TableId,
        grantees: Vec<Address>,
        privileges: Privileges,
    },
}

impl Event {
    /// The table the event operates on.
    #[must_use]
    pub fn table_id(&self) -> TableId {
        match self {
            Self::CreateTable { table_id, .. }
            | Self::RunSql { table_id, .. }
            | Self::SetController { table_id, .. }
            | Self::Grant { table_id, .. }
            | Self::Revoke { table_id, .. } => *table_id,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create_table",
            Self::RunSql { .. } => "run_sql",
            Self::SetController { .. } => "set_controller",
            Self::Grant { .. } => "grant",
            Self::Revoke { .. } => "revoke",
        }
    }
}

/// The ordered events emitted by one chain transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnEvents {
    pub txn_hash: TxnHash,
    pub events: Vec<Event>,
}

// =============================================================================
// RESULTS
// =============================================================================

/// Outcome of executing one chain transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnExecutionResult {
    /// Table of the last event that was processed.
    pub table_id: Option<TableId>,

    /// Rendered recoverable error; `None` on success.
    pub error: Option<String>,

    /// 0-based index of the failing event.
    pub error_event_index: Option<usize>,
}

impl TxnExecutionResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Persisted outcome of a chain transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub chain_id: ChainId,
    pub block_number: u64,
    pub index_in_block: u64,
    pub txn_hash: TxnHash,
    pub table_id: Option<TableId>,
    pub error: Option<String>,
    pub error_event_index: Option<usize>,
}

impl Receipt {
    /// Builds the receipt of the `index_in_block`-th transaction of a block.
    #[must_use]
    pub fn new(
        chain_id: ChainId,
        block_number: u64,
        index_in_block: u64,
        txn_hash: TxnHash,
        result: &TxnExecutionResult,
    ) -> Self {
        Self {
            chain_id,
            block_number,
            index_in_block,
            txn_hash,
            table_id: result.table_id,
            error: result.error.clone(),
            error_event_index: result.error_event_index,
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// A registered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub chain_id: ChainId,
    pub table_id: TableId,
    pub owner: Address,
    pub prefix: String,
    /// Hex sha256 of the table's column structure.
    pub structure: String,
    /// Block height at which the table was created.
    pub created_at: u64,
}

impl TableRecord {
    /// SQL name of the table: `{prefix}_{chain_id}_{table_id}`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}_{}_{}", self.prefix, self.chain_id, self.table_id)
    }
}

/// ACL entry of a controller on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub table_id: TableId,
    pub controller: Address,
    pub privileges: Privileges,
    pub created_at: u64,
    pub updated_at: Option<u64>,
}

// =============================================================================
// STATE HASH
// =============================================================================

/// Digest of the chain's full database state at the end of a block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateHash(pub [u8; 32]);

impl fmt::Display for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateHash({self})")
    }
}
