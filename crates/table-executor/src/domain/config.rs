//! # Executor Configuration
//!
//! Per-chain limits applied while executing events.

use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};
use shared_types::{ChainId, TableId};
use std::collections::HashSet;

/// Default maximum live rows per table.
pub const DEFAULT_MAX_ROW_COUNT: u64 = 100_000;

/// Default maximum length of a `RunSql` statement text, in bytes.
pub const DEFAULT_MAX_WRITE_QUERY_SIZE: usize = 35_000;

/// Configuration of one [`Executor`](crate::service::Executor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Chain whose events this executor applies.
    pub chain_id: ChainId,

    #[serde(default)]
    pub table_constraints: TableConstraints,

    #[serde(default)]
    pub query_constraints: QueryConstraints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConstraints {
    /// Maximum live rows per table. `0` disables the limit.
    #[serde(default = "default_max_row_count")]
    pub max_row_count: u64,

    /// Per-table exceptions to `max_row_count`.
    #[serde(default)]
    pub overrides: Vec<RowCountOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCountOverride {
    pub table_id: TableId,
    pub max_row_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConstraints {
    #[serde(default = "default_max_write_query_size")]
    pub max_write_query_size: usize,
}

const fn default_max_row_count() -> u64 {
    DEFAULT_MAX_ROW_COUNT
}

const fn default_max_write_query_size() -> usize {
    DEFAULT_MAX_WRITE_QUERY_SIZE
}

impl Default for TableConstraints {
    fn default() -> Self {
        Self {
            max_row_count: DEFAULT_MAX_ROW_COUNT,
            overrides: Vec::new(),
        }
    }
}

impl Default for QueryConstraints {
    fn default() -> Self {
        Self {
            max_write_query_size: DEFAULT_MAX_WRITE_QUERY_SIZE,
        }
    }
}

impl ExecutorConfig {
    /// Default limits for `chain_id`.
    #[must_use]
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            table_constraints: TableConstraints::default(),
            query_constraints: QueryConstraints::default(),
        }
    }

    /// Sets the global row limit (`0` = unlimited).
    #[must_use]
    pub fn with_max_row_count(mut self, max_row_count: u64) -> Self {
        self.table_constraints.max_row_count = max_row_count;
        self
    }

    #[must_use]
    pub fn with_row_count_override(mut self, table_id: TableId, max_row_count: u64) -> Self {
        self.table_constraints.overrides.push(RowCountOverride {
            table_id,
            max_row_count,
        });
        self
    }

    #[must_use]
    pub fn with_max_write_query_size(mut self, size: usize) -> Self {
        self.query_constraints.max_write_query_size = size;
        self
    }

    /// Effective row limit for a table; `0` means unlimited.
    #[must_use]
    pub fn max_row_count_for(&self, table_id: &TableId) -> u64 {
        self.table_constraints
            .overrides
            .iter()
            .find(|o| &o.table_id == table_id)
            .map_or(self.table_constraints.max_row_count, |o| o.max_row_count)
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.get() <= 0 {
            return Err(ConfigError::InvalidChainId(self.chain_id));
        }
        if self.query_constraints.max_write_query_size == 0 {
            return Err(ConfigError::ZeroQuerySize);
        }
        let mut seen = HashSet::new();
        for o in &self.table_constraints.overrides {
            if !seen.insert(o.table_id) {
                return Err(ConfigError::DuplicateOverride(o.table_id));
            }
        }
        Ok(())
    }
}
