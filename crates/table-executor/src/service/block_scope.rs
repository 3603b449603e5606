//! Block-level transaction.

use super::txn_scope::TxnScope;
use super::Inner;
use crate::adapters::{SqliteAcl, SqliteSystemStore};
use crate::domain::entities::{Receipt, StateHash, TxnEvents, TxnExecutionResult};
use crate::domain::errors::ExecutorError;
use crate::ports::inbound::BlockScopeApi;
use crate::ports::outbound::{Acl, SystemStore};
use rusqlite::Connection;
use shared_types::TxnHash;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Open,
    Committed,
    Closed,
}

impl ScopeState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::Closed => "closed",
        }
    }
}

/// The open transaction of one block. Dropping an uncommitted scope rolls
/// it back.
pub struct BlockScope<A: Acl = SqliteAcl, S: SystemStore = SqliteSystemStore> {
    inner: Arc<Inner<A, S>>,
    id: u64,
    height: u64,
    state: ScopeState,
}

impl<A: Acl, S: SystemStore> BlockScope<A, S> {
    pub(crate) fn new(inner: Arc<Inner<A, S>>, id: u64, height: u64) -> Self {
        Self {
            inner,
            id,
            height,
            state: ScopeState::Open,
        }
    }

    /// Stored receipt of a transaction, if any.
    ///
    /// # Errors
    ///
    /// Storage failures, or a scope that is no longer open.
    pub fn txn_receipt(&self, txn_hash: &TxnHash) -> Result<Option<Receipt>, ExecutorError> {
        self.with_conn(|conn, inner| inner.system.receipt(conn, txn_hash))
    }

    fn ensure_open(&self) -> Result<(), ExecutorError> {
        match self.state {
            ScopeState::Open => Ok(()),
            state => Err(ExecutorError::ScopeTerminated {
                height: self.height,
                state: state.as_str(),
            }),
        }
    }

    /// Runs `f` on the connection while this scope still owns the transaction.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection, &Inner<A, S>) -> Result<T, ExecutorError>,
    ) -> Result<T, ExecutorError> {
        self.ensure_open()?;
        let shared = self.inner.state.lock();
        if shared.open_scope != Some(self.id) {
            return Err(ExecutorError::Closed);
        }
        let conn = shared.conn.as_ref().ok_or(ExecutorError::Closed)?;
        f(conn, &self.inner)
    }
}

impl<A: Acl, S: SystemStore> BlockScopeApi for BlockScope<A, S> {
    fn height(&self) -> u64 {
        self.height
    }

    #[instrument(skip_all, fields(height = self.height, txn_hash = %txn.txn_hash))]
    fn execute_txn_events(&mut self, txn: &TxnEvents) -> Result<TxnExecutionResult, ExecutorError> {
        let height = self.height;
        self.with_conn(|conn, inner| TxnScope::new(conn, inner, height).execute(txn))
    }

    fn save_txn_receipts(&mut self, receipts: &[Receipt]) -> Result<(), ExecutorError> {
        self.with_conn(|conn, inner| inner.system.save_receipts(conn, receipts))?;
        debug!(height = self.height, count = receipts.len(), "receipts saved");
        Ok(())
    }

    fn txn_receipt_exists(&self, txn_hash: &TxnHash) -> Result<bool, ExecutorError> {
        self.with_conn(|conn, inner| inner.system.receipt_exists(conn, txn_hash))
    }

    fn state_hash(&self) -> Result<StateHash, ExecutorError> {
        self.with_conn(|conn, inner| inner.system.state_hash(conn))
    }

    #[instrument(skip(self), fields(height = self.height))]
    fn commit(&mut self) -> Result<(), ExecutorError> {
        self.ensure_open()?;
        let mut shared = self.inner.state.lock();
        if shared.open_scope != Some(self.id) {
            self.state = ScopeState::Closed;
            return Err(ExecutorError::Closed);
        }
        let Some(conn) = shared.conn.as_ref() else {
            self.state = ScopeState::Closed;
            return Err(ExecutorError::Closed);
        };

        let committed = self
            .inner
            .system
            .set_last_processed_height(conn, self.height)
            .and_then(|()| Ok(conn.execute_batch("COMMIT")?));

        if let Err(err) = committed {
            if !conn.is_autocommit() {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    warn!(error = %rollback, "rollback after failed commit");
                }
            }
            shared.open_scope = None;
            self.state = ScopeState::Closed;
            return Err(err);
        }

        shared.open_scope = None;
        shared.last_committed = Some(self.height);
        self.state = ScopeState::Committed;
        info!("block scope committed");
        Ok(())
    }

    fn close(&mut self) -> Result<(), ExecutorError> {
        if self.state != ScopeState::Open {
            return Ok(());
        }
        self.state = ScopeState::Closed;

        let mut shared = self.inner.state.lock();
        if shared.open_scope != Some(self.id) {
            return Ok(());
        }
        shared.open_scope = None;
        if let Some(conn) = shared.conn.as_ref() {
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK")?;
            }
        }
        debug!(height = self.height, "block scope rolled back");
        Ok(())
    }
}

impl<A: Acl, S: SystemStore> Drop for BlockScope<A, S> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(height = self.height, error = %err, "failed to roll back block scope");
        }
    }
}
