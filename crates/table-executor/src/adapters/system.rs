//! `SQLite` system store: registry, controllers, receipts and the processed
//! block height of one chain.

use crate::adapters::{decode, schema, state_hash};
use crate::domain::entities::{Receipt, StateHash, TableRecord};
use crate::domain::errors::ExecutorError;
use crate::parsing::table_name::TableName;
use crate::ports::outbound::SystemStore;
use rusqlite::{params, Connection, OptionalExtension};
use shared_types::{Address, ChainId, TableId, TxnHash};

#[derive(Debug, Clone)]
pub struct SqliteSystemStore {
    chain_id: ChainId,
}

impl SqliteSystemStore {
    #[must_use]
    pub fn new(chain_id: ChainId) -> Self {
        Self { chain_id }
    }
}

impl SystemStore for SqliteSystemStore {
    fn install(&self, conn: &Connection) -> Result<(), ExecutorError> {
        schema::install(conn)?;
        Ok(())
    }

    fn table(&self, conn: &Connection, table_id: &TableId) -> Result<Option<TableRecord>, ExecutorError> {
        let row = conn
            .query_row(
                "SELECT controller, prefix, structure, created_at FROM registry
                 WHERE chain_id = ?1 AND id = ?2",
                params![self.chain_id.get(), table_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(owner, prefix, structure, created_at)| {
            Ok(TableRecord {
                chain_id: self.chain_id,
                table_id: *table_id,
                owner: decode::address(&owner)?,
                prefix,
                structure,
                created_at: decode::unsigned(created_at)?,
            })
        })
        .transpose()
    }

    fn register_table(&self, conn: &Connection, record: &TableRecord) -> Result<(), ExecutorError> {
        conn.execute(
            "INSERT INTO registry (id, chain_id, controller, prefix, structure, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.table_id.to_string(),
                self.chain_id.get(),
                record.owner.to_string(),
                record.prefix,
                record.structure,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn controller(&self, conn: &Connection, table_id: &TableId) -> Result<Option<Address>, ExecutorError> {
        let controller: Option<String> = conn
            .query_row(
                "SELECT controller FROM system_controller WHERE chain_id = ?1 AND table_id = ?2",
                params![self.chain_id.get(), table_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        controller.as_deref().map(decode::address).transpose()
    }

    fn set_controller(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controller: &Address,
    ) -> Result<(), ExecutorError> {
        if controller.is_zero() {
            conn.execute(
                "DELETE FROM system_controller WHERE chain_id = ?1 AND table_id = ?2",
                params![self.chain_id.get(), table_id.to_string()],
            )?;
        } else {
            conn.execute(
                "INSERT INTO system_controller (chain_id, table_id, controller) VALUES (?1, ?2, ?3)
                 ON CONFLICT (chain_id, table_id) DO UPDATE SET controller = excluded.controller",
                params![self.chain_id.get(), table_id.to_string(), controller.to_string()],
            )?;
        }
        Ok(())
    }

    fn row_count(&self, conn: &Connection, table: &TableName) -> Result<u64, ExecutorError> {
        let count: i64 = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))?;
        decode::unsigned(count)
    }

    fn last_processed_height(&self, conn: &Connection) -> Result<Option<u64>, ExecutorError> {
        let height: Option<i64> = conn
            .query_row(
                "SELECT block_number FROM system_txn_processor WHERE chain_id = ?1",
                params![self.chain_id.get()],
                |row| row.get(0),
            )
            .optional()?;
        height.map(decode::unsigned).transpose()
    }

    fn set_last_processed_height(&self, conn: &Connection, height: u64) -> Result<(), ExecutorError> {
        conn.execute(
            "INSERT INTO system_txn_processor (chain_id, block_number) VALUES (?1, ?2)
             ON CONFLICT (chain_id) DO UPDATE SET block_number = excluded.block_number",
            params![self.chain_id.get(), height],
        )?;
        Ok(())
    }

    fn save_receipts(&self, conn: &Connection, receipts: &[Receipt]) -> Result<(), ExecutorError> {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO system_txn_receipts
                (chain_id, block_number, index_in_block, txn_hash, error, error_event_idx, table_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for receipt in receipts {
            let error_event_idx = receipt
                .error_event_index
                .map(i64::try_from)
                .transpose()
                .map_err(|e| ExecutorError::CorruptState(format!("event index out of range: {e}")))?;
            stmt.execute(params![
                self.chain_id.get(),
                receipt.block_number,
                receipt.index_in_block,
                receipt.txn_hash.to_string(),
                receipt.error,
                error_event_idx,
                receipt.table_id.map(|id| id.to_string()),
            ])?;
        }
        Ok(())
    }

    fn receipt_exists(&self, conn: &Connection, txn_hash: &TxnHash) -> Result<bool, ExecutorError> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM system_txn_receipts WHERE chain_id = ?1 AND txn_hash = ?2 LIMIT 1",
                params![self.chain_id.get(), txn_hash.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn receipt(&self, conn: &Connection, txn_hash: &TxnHash) -> Result<Option<Receipt>, ExecutorError> {
        let row = conn
            .query_row(
                "SELECT block_number, index_in_block, txn_hash, error, error_event_idx, table_id
                 FROM system_txn_receipts WHERE chain_id = ?1 AND txn_hash = ?2
                 ORDER BY block_number DESC, index_in_block DESC LIMIT 1",
                params![self.chain_id.get(), txn_hash.to_string()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(block_number, index_in_block, hash, error, error_event_idx, table_id)| {
            Ok(Receipt {
                chain_id: self.chain_id,
                block_number: decode::unsigned(block_number)?,
                index_in_block: decode::unsigned(index_in_block)?,
                txn_hash: decode::txn_hash(&hash)?,
                table_id: table_id.as_deref().map(decode::table_id).transpose()?,
                error,
                error_event_index: error_event_idx
                    .map(|i| {
                        usize::try_from(i)
                            .map_err(|_| ExecutorError::CorruptState(format!("invalid event index {i}")))
                    })
                    .transpose()?,
            })
        })
        .transpose()
    }

    fn state_hash(&self, conn: &Connection) -> Result<StateHash, ExecutorError> {
        state_hash::compute(conn, self.chain_id)
    }
}
