//! Shared fixtures for the executor integration tests.

#![allow(dead_code)]

use rusqlite::Connection;
use std::path::PathBuf;
use table_executor::prelude::*;
use table_executor::{Acl, SqliteAcl};
use tempfile::TempDir;

pub const CHAIN_ID: ChainId = ChainId(1337);
pub const TABLE: &str = "foo_1337_100";

/// Routes executor logs through the test harness; `RUST_LOG` selects levels.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn owner() -> Address {
    "0xd43c59d5694ec111eb9e986c233200b14249558d".parse().unwrap()
}

pub fn controller() -> Address {
    "0x4afe8e30db4549384b0a05bb796468b130c7d6e0".parse().unwrap()
}

pub fn stranger() -> Address {
    "0x0000000000000000000000000000000000000042".parse().unwrap()
}

pub fn table_id() -> TableId {
    TableId::from(100u64)
}

pub fn txn(events: Vec<Event>) -> TxnEvents {
    TxnEvents {
        txn_hash: TxnHash::new(rand::random()),
        events,
    }
}

pub fn create_table(statement: &str) -> Event {
    Event::CreateTable {
        owner: owner(),
        table_id: table_id(),
        statement: statement.to_string(),
    }
}

pub fn owner_sql(statement: &str) -> Event {
    Event::RunSql {
        caller: owner(),
        is_owner: true,
        table_id: table_id(),
        statement: statement.to_string(),
        policy: PolicyData::allow_all(),
    }
}

pub fn sql_as(caller: Address, statement: &str, policy: PolicyData) -> Event {
    Event::RunSql {
        caller,
        is_owner: caller == owner(),
        table_id: table_id(),
        statement: statement.to_string(),
        policy,
    }
}

pub fn set_controller(controller: Address) -> Event {
    Event::SetController {
        table_id: table_id(),
        controller,
    }
}

/// An executor on a temporary database file, driving one block per call.
pub struct Harness {
    pub executor: Executor,
    pub path: PathBuf,
    next_height: u64,
    _dir: TempDir,
}

impl Harness {
    pub fn new(config: ExecutorConfig) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.db");
        let executor = Executor::open(&path, config).unwrap();
        Self {
            executor,
            path,
            next_height: 1,
            _dir: dir,
        }
    }

    /// Harness with `foo_1337_100 (zar text)` already created.
    pub fn with_table() -> Self {
        Self::with_table_config("create table foo_1337 (zar text)", ExecutorConfig::new(CHAIN_ID))
    }

    pub fn with_table_config(create: &str, config: ExecutorConfig) -> Self {
        let mut harness = Self::new(config);
        let results = harness.block(vec![txn(vec![create_table(create)])]);
        assert!(results[0].is_success(), "{:?}", results[0]);
        harness
    }

    /// Executes `txns` in a fresh block scope, saves receipts and commits.
    pub fn block(&mut self, txns: Vec<TxnEvents>) -> Vec<TxnExecutionResult> {
        let height = self.next_height;
        self.next_height += 1;

        let mut scope = self.executor.new_block_scope(height).unwrap();
        let mut results = Vec::with_capacity(txns.len());
        let mut receipts = Vec::with_capacity(txns.len());
        for (index, txn) in txns.iter().enumerate() {
            let result = scope.execute_txn_events(txn).unwrap();
            receipts.push(Receipt::new(CHAIN_ID, height, index as u64, txn.txn_hash, &result));
            results.push(result);
        }
        scope.save_txn_receipts(&receipts).unwrap();
        scope.commit().unwrap();
        results
    }

    /// Single-transaction block.
    pub fn run(&mut self, events: Vec<Event>) -> TxnExecutionResult {
        self.block(vec![txn(events)]).remove(0)
    }

    pub fn next_height(&self) -> u64 {
        self.next_height
    }

    /// Connection reading committed state.
    pub fn reader(&self) -> Connection {
        Connection::open(&self.path).unwrap()
    }

    pub fn row_count(&self) -> i64 {
        self.reader()
            .query_row(&format!("SELECT count(*) FROM {TABLE}"), [], |row| row.get(0))
            .unwrap()
    }

    pub fn column(&self, sql: &str) -> Vec<String> {
        let conn = self.reader();
        let mut stmt = conn.prepare(sql).unwrap();
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    }

    pub fn privileges(&self, address: &Address) -> Privileges {
        SqliteAcl::new(CHAIN_ID)
            .privileges(&self.reader(), &table_id(), address)
            .unwrap()
    }
}

pub fn assert_failed(result: &TxnExecutionResult, index: usize, message: &str) {
    assert_eq!(result.error.as_deref(), Some(message), "{result:?}");
    assert_eq!(result.error_event_index, Some(index));
}
