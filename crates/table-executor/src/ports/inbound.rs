//! # Inbound Ports (Driving Ports)
//!
//! The API the event-feed driver uses to apply blocks.

use crate::domain::entities::{Receipt, StateHash, TxnEvents, TxnExecutionResult};
use crate::domain::errors::ExecutorError;
use shared_types::{ChainId, TxnHash};

/// Owner of the database connection and of block-height bookkeeping.
///
/// ## Invariants
///
/// - at most one block scope is open at a time
/// - block heights strictly increase across committed scopes
/// - closing rolls back any open scope
pub trait ExecutorApi {
    type Scope: BlockScopeApi;

    /// Opens the block-level transaction for `height`.
    ///
    /// ## Errors
    ///
    /// - `ScopeAlreadyOpen`: another scope has not been committed or closed
    /// - `Closed`: the executor was closed
    /// - `NonIncreasingHeight`: `height` is not above the last committed one
    fn new_block_scope(&self, height: u64) -> Result<Self::Scope, ExecutorError>;

    /// Height of the last committed block scope, if any.
    fn last_committed_height(&self) -> Result<Option<u64>, ExecutorError>;

    fn chain_id(&self) -> ChainId;

    /// Rolls back an open scope and releases the connection. Idempotent.
    fn close(&self) -> Result<(), ExecutorError>;
}

/// One open block-level transaction.
///
/// Lifecycle: `Open` → exactly one of `Committed` (via [`commit`]) or
/// `Closed` (via [`close`] or drop).
///
/// [`commit`]: BlockScopeApi::commit
/// [`close`]: BlockScopeApi::close
pub trait BlockScopeApi {
    fn height(&self) -> u64;

    /// Applies one chain transaction atomically.
    ///
    /// A failing event reverts the whole transaction and is reported in the
    /// result; only infrastructure failures return `Err`.
    fn execute_txn_events(&mut self, txn: &TxnEvents) -> Result<TxnExecutionResult, ExecutorError>;

    fn save_txn_receipts(&mut self, receipts: &[Receipt]) -> Result<(), ExecutorError>;

    fn txn_receipt_exists(&self, txn_hash: &TxnHash) -> Result<bool, ExecutorError>;

    /// Digest of the state as seen inside this scope.
    fn state_hash(&self) -> Result<StateHash, ExecutorError>;

    /// Records the height as processed and commits.
    ///
    /// ## Errors
    ///
    /// `ScopeTerminated` when already committed or closed.
    fn commit(&mut self) -> Result<(), ExecutorError>;

    /// Rolls back unless committed. No-op on a terminal scope.
    fn close(&mut self) -> Result<(), ExecutorError>;
}
