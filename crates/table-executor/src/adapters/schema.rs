//! System tables.
//!
//! Table ids are stored as decimal text and addresses as lowercase `0x` hex.
//! Heights and timestamps are block numbers.

use rusqlite::Connection;

pub(crate) const SYSTEM_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS registry (
    id TEXT NOT NULL,
    chain_id INTEGER NOT NULL,
    controller TEXT NOT NULL,
    prefix TEXT NOT NULL,
    structure TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (chain_id, id)
);

CREATE TABLE IF NOT EXISTS system_controller (
    chain_id INTEGER NOT NULL,
    table_id TEXT NOT NULL,
    controller TEXT NOT NULL,
    PRIMARY KEY (chain_id, table_id)
);

CREATE TABLE IF NOT EXISTS system_acl (
    chain_id INTEGER NOT NULL,
    table_id TEXT NOT NULL,
    controller TEXT NOT NULL,
    privileges INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER,
    PRIMARY KEY (chain_id, table_id, controller)
);

CREATE TABLE IF NOT EXISTS system_txn_receipts (
    chain_id INTEGER NOT NULL,
    block_number INTEGER NOT NULL,
    index_in_block INTEGER NOT NULL,
    txn_hash TEXT NOT NULL,
    error TEXT,
    error_event_idx INTEGER,
    table_id TEXT,
    PRIMARY KEY (chain_id, block_number, index_in_block)
);

CREATE INDEX IF NOT EXISTS system_txn_receipts_txn_hash
    ON system_txn_receipts (chain_id, txn_hash);

CREATE TABLE IF NOT EXISTS system_txn_processor (
    chain_id INTEGER PRIMARY KEY,
    block_number INTEGER NOT NULL
);
";

/// Creates the system tables; safe to run on every start.
pub(crate) fn install(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SYSTEM_SCHEMA)
}

/// Connection pragmas applied by `Executor::open`.
pub(crate) fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA synchronous = FULL;")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
}
