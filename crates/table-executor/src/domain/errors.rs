//! # Domain Errors
//!
//! Error tiers of the execution engine.
//!
//! - [`ExecutionError`] is recoverable: it fails one chain transaction, is
//!   rendered into `TxnExecutionResult::error`, and block processing continues.
//! - [`ExecutorError`] is fatal: storage or lifecycle failures that must halt
//!   ingestion. These propagate with `?`.
//!
//! [`ParseError`] and [`PolicyError`] are the recoverable sub-kinds produced by
//! statement parsing and policy enforcement.

use crate::domain::policy::InvalidPolicy;
use crate::domain::privileges::Operation;
use rusqlite::ErrorCode;
use shared_types::{ChainId, TableId};
use sqlparser::parser::ParserError;
use sqlparser::tokenizer::TokenizerError;
use thiserror::Error;

// =============================================================================
// PARSE ERRORS
// =============================================================================

/// Statement text could not be turned into an accepted statement list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No statement found in the submitted text.
    #[error("the statement is empty")]
    Empty,

    /// Submitted text is longer than the configured limit.
    #[error("statement length {len} exceeds the maximum of {max}")]
    TooLong { len: usize, max: usize },

    /// Tokenizer or grammar failure.
    #[error("unable to parse the query: {0}")]
    Syntax(String),

    /// Parsed, but not one of the accepted statement kinds.
    #[error("the query isn't a write statement")]
    NotWriteStatement,

    /// A construct the engine does not accept inside write statements.
    #[error("{0} is not allowed")]
    Disallowed(&'static str),

    /// Function whose result is not a deterministic function of its inputs.
    #[error("non-deterministic function {0} is not allowed")]
    NonDeterministicFunction(String),

    /// Anything that reads from a relation inside an expression.
    #[error("sub-queries are not allowed")]
    SubQuery,

    /// Table reference does not follow `{prefix}_{chain_id}_{table_id}`.
    #[error("invalid table name {0}")]
    InvalidTableName(String),

    /// Table reference names another chain.
    #[error("query targets chain id {found} and not {expected}")]
    ChainMismatch { found: ChainId, expected: ChainId },

    /// Table reference names another table than the event.
    #[error("query targets table id {found} and not {expected}")]
    TableMismatch { found: TableId, expected: TableId },

    /// Malformed GRANT/REVOKE.
    #[error("invalid grant statement: {0}")]
    InvalidGrant(String),

    /// Malformed or disallowed CREATE TABLE.
    #[error("invalid create statement: {0}")]
    InvalidCreate(String),

    /// Tokens left after a complete statement or expression.
    #[error("unexpected input after the end of the statement")]
    TrailingTokens,
}

impl From<ParserError> for ParseError {
    fn from(err: ParserError) -> Self {
        Self::Syntax(err.to_string())
    }
}

impl From<TokenizerError> for ParseError {
    fn from(err: TokenizerError) -> Self {
        Self::Syntax(err.to_string())
    }
}

// =============================================================================
// POLICY ERRORS
// =============================================================================

/// A controller policy rejected a statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Operation kind disabled by the policy.
    #[error("{0} is not allowed by policy")]
    OperationNotAllowed(Operation),

    /// UPDATE assigns a column outside `updatable_columns`.
    #[error("column {0} is not allowed")]
    ColumnNotAllowed(String),

    /// The policy carried by the event does not validate.
    #[error("invalid policy: {0}")]
    Invalid(#[from] InvalidPolicy),
}

// =============================================================================
// EXECUTION ERRORS (RECOVERABLE)
// =============================================================================

/// Failure of a single event; aborts and reverts its chain transaction only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Referenced table is not in the registry.
    #[error("table id {0} not found")]
    TableNotFound(TableId),

    /// `CreateTable` for an id that is already registered.
    #[error("table id {0} already exists")]
    TableAlreadyExists(TableId),

    /// Caller lacks the ACL privilege for the operation.
    #[error("not enough privileges")]
    NotEnoughPrivileges,

    /// GRANT/REVOKE submitted through `RunSql` by a non-owner.
    #[error("non owner cannot execute grant stmt")]
    NonOwnerGrant,

    /// Live row count exceeded the table's maximum.
    #[error("table maximum row count exceeded (before {before}, after {after})")]
    RowCountExceeded { before: u64, after: u64 },

    /// `with_check` audit found touched rows violating the check.
    #[error("number of affected rows {affected} does not match auditing count {audited}")]
    AuditMismatch { affected: u64, audited: u64 },

    /// SQLite rejected a user statement for a non-infrastructure reason.
    #[error("db query execution failed (code: {code:?}, msg: {message})")]
    Sql { code: ErrorCode, message: String },
}

// =============================================================================
// EXECUTOR ERRORS (FATAL)
// =============================================================================

/// Infrastructure or lifecycle failure; halts ingestion.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Storage failure.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// `new_block_scope` while another scope is open.
    #[error("a block scope is already open")]
    ScopeAlreadyOpen,

    /// Any use after `Executor::close`.
    #[error("executor is closed")]
    Closed,

    /// Block heights must strictly increase across committed scopes.
    #[error("block height {requested} is not greater than the last committed height {last}")]
    NonIncreasingHeight { requested: u64, last: u64 },

    /// Operation on a block scope that was already committed or closed.
    #[error("block scope at height {height} is already {state}")]
    ScopeTerminated { height: u64, state: &'static str },

    /// Persisted system state that cannot be decoded.
    #[error("corrupted system state: {0}")]
    CorruptState(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ExecutorError {
    /// SQLite codes that signal a broken store rather than a bad statement.
    #[must_use]
    pub fn is_infrastructure_code(code: ErrorCode) -> bool {
        matches!(
            code,
            ErrorCode::InternalMalfunction
                | ErrorCode::PermissionDenied
                | ErrorCode::OperationAborted
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::OutOfMemory
                | ErrorCode::ReadOnly
                | ErrorCode::OperationInterrupted
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::DiskFull
                | ErrorCode::CannotOpen
                | ErrorCode::FileLockingProtocolFailed
                | ErrorCode::NotADatabase
        )
    }
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("chain id must be positive, got {0}")]
    InvalidChainId(ChainId),

    #[error("max_write_query_size must be positive")]
    ZeroQuerySize,

    #[error("duplicate row count override for table {0}")]
    DuplicateOverride(TableId),
}

// =============================================================================
// EVENT OUTCOME
// =============================================================================

/// How an event failed: recoverable for the transaction, or fatal for the node.
#[derive(Debug)]
pub(crate) enum EventError {
    Rejected(ExecutionError),
    Fatal(ExecutorError),
}

impl EventError {
    /// Classifies an error raised by a user-submitted statement.
    pub(crate) fn from_user_sql(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message)
                if !ExecutorError::is_infrastructure_code(failure.code) =>
            {
                let message = message.unwrap_or_else(|| failure.to_string());
                Self::Rejected(ExecutionError::Sql {
                    code: failure.code,
                    message,
                })
            }
            other => Self::Fatal(ExecutorError::Storage(other)),
        }
    }
}

impl From<ExecutionError> for EventError {
    fn from(err: ExecutionError) -> Self {
        Self::Rejected(err)
    }
}

impl From<ParseError> for EventError {
    fn from(err: ParseError) -> Self {
        Self::Rejected(err.into())
    }
}

impl From<PolicyError> for EventError {
    fn from(err: PolicyError) -> Self {
        Self::Rejected(err.into())
    }
}

impl From<ExecutorError> for EventError {
    fn from(err: ExecutorError) -> Self {
        Self::Fatal(err)
    }
}

/// System-table queries never fail recoverably.
impl From<rusqlite::Error> for EventError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Fatal(ExecutorError::Storage(err))
    }
}

// =============================================================================
// TESTS
// =============================================================================
