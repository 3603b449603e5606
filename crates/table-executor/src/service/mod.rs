//! # Executor Service
//!
//! Owns the database connection and hands out one [`BlockScope`] at a time.
//!
//! ```text
//! Executor ──new_block_scope(h)──→ BlockScope ──execute_txn_events──→ TxnScope
//!    │                                 │                                 │
//!    │                          BEGIN IMMEDIATE                   SAVEPOINT txn_scope
//!    │                          COMMIT | ROLLBACK        RELEASE | ROLLBACK TO + RELEASE
//!    └── close(): ROLLBACK of any open scope, connection released
//! ```

mod block_scope;
mod runsql;
mod txn_scope;

pub use block_scope::BlockScope;

use crate::adapters::{schema, SqliteAcl, SqliteSystemStore};
use crate::domain::config::ExecutorConfig;
use crate::domain::errors::ExecutorError;
use crate::ports::inbound::ExecutorApi;
use crate::ports::outbound::{Acl, SystemStore};
use parking_lot::Mutex;
use rusqlite::Connection;
use shared_types::ChainId;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Connection and scope bookkeeping shared between the executor and its
/// open block scope.
pub(crate) struct Shared {
    pub(crate) conn: Option<Connection>,
    pub(crate) open_scope: Option<u64>,
    pub(crate) next_scope_id: u64,
    pub(crate) last_committed: Option<u64>,
}

pub(crate) struct Inner<A, S> {
    pub(crate) state: Mutex<Shared>,
    pub(crate) config: ExecutorConfig,
    pub(crate) acl: A,
    pub(crate) system: S,
}

/// Storage adapters used by an [`Executor`].
pub struct ExecutorDependencies<A, S> {
    pub acl: A,
    pub system: S,
}

/// Applies registry events of one chain to a `SQLite` database.
pub struct Executor<A: Acl = SqliteAcl, S: SystemStore = SqliteSystemStore> {
    inner: Arc<Inner<A, S>>,
}

impl Executor {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Storage failures and invalid configuration.
    pub fn open(path: impl AsRef<Path>, config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let conn = Connection::open(path)?;
        schema::apply_pragmas(&conn)?;
        Self::new(conn, config)
    }

    /// Wraps an already open connection.
    ///
    /// # Errors
    ///
    /// Storage failures and invalid configuration.
    pub fn new(conn: Connection, config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let deps = ExecutorDependencies {
            acl: SqliteAcl::new(config.chain_id),
            system: SqliteSystemStore::new(config.chain_id),
        };
        Self::with_dependencies(conn, config, deps)
    }
}

impl<A: Acl, S: SystemStore> Executor<A, S> {
    /// Installs the system schema and loads the last committed height.
    ///
    /// # Errors
    ///
    /// Storage failures and invalid configuration.
    #[instrument(skip_all, fields(chain_id = %config.chain_id))]
    pub fn with_dependencies(
        conn: Connection,
        config: ExecutorConfig,
        deps: ExecutorDependencies<A, S>,
    ) -> Result<Self, ExecutorError> {
        config.validate()?;
        deps.system.install(&conn)?;
        let last_committed = deps.system.last_processed_height(&conn)?;
        info!(?last_committed, "executor ready");

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(Shared {
                    conn: Some(conn),
                    open_scope: None,
                    next_scope_id: 0,
                    last_committed,
                }),
                config,
                acl: deps.acl,
                system: deps.system,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }
}

impl<A: Acl, S: SystemStore> ExecutorApi for Executor<A, S> {
    type Scope = BlockScope<A, S>;

    #[instrument(skip(self), fields(chain_id = %self.inner.config.chain_id))]
    fn new_block_scope(&self, height: u64) -> Result<BlockScope<A, S>, ExecutorError> {
        let mut state = self.inner.state.lock();
        let Some(conn) = state.conn.as_ref() else {
            return Err(ExecutorError::Closed);
        };
        if state.open_scope.is_some() {
            return Err(ExecutorError::ScopeAlreadyOpen);
        }
        if let Some(last) = state.last_committed {
            if height <= last {
                return Err(ExecutorError::NonIncreasingHeight {
                    requested: height,
                    last,
                });
            }
        }
        conn.execute_batch("BEGIN IMMEDIATE")?;

        let id = state.next_scope_id;
        state.next_scope_id += 1;
        state.open_scope = Some(id);
        info!("block scope opened");

        Ok(BlockScope::new(Arc::clone(&self.inner), id, height))
    }

    fn last_committed_height(&self) -> Result<Option<u64>, ExecutorError> {
        let state = self.inner.state.lock();
        if state.conn.is_none() {
            return Err(ExecutorError::Closed);
        }
        Ok(state.last_committed)
    }

    fn chain_id(&self) -> ChainId {
        self.inner.config.chain_id
    }

    fn close(&self) -> Result<(), ExecutorError> {
        let mut state = self.inner.state.lock();
        let Some(conn) = state.conn.take() else {
            return Ok(());
        };
        if state.open_scope.take().is_some() && !conn.is_autocommit() {
            warn!(chain_id = %self.inner.config.chain_id, "rolling back open block scope on close");
            conn.execute_batch("ROLLBACK")?;
        }
        conn.close().map_err(|(_, err)| ExecutorError::Storage(err))?;
        info!(chain_id = %self.inner.config.chain_id, "executor closed");
        Ok(())
    }
}

impl<A: Acl, S: SystemStore> Drop for Executor<A, S> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close executor");
        }
    }
}
