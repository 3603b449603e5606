//! Block feed ingestion.
//!
//! A feed is a JSON array of blocks, each carrying the transactions observed
//! for one chain at one height. Blocks at or below a chain's last committed
//! height are skipped, so replaying a feed after a restart resumes where the
//! previous run stopped.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use shared_types::ChainId;
use std::collections::BTreeMap;
use std::path::Path;
use table_executor::prelude::*;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct FeedBlock {
    pub chain_id: ChainId,
    pub height: u64,
    #[serde(default)]
    pub txns: Vec<TxnEvents>,
}

/// Reads a feed file.
///
/// # Errors
///
/// Unreadable or malformed file.
pub fn load_feed(path: &Path) -> Result<Vec<FeedBlock>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading feed {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing feed {}", path.display()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Committed { state_hash: StateHash, failed_txns: usize },
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub committed: usize,
    pub skipped: usize,
    pub failed_txns: usize,
}

/// One executor per configured chain, all on the same database file.
pub struct Node {
    executors: BTreeMap<ChainId, Executor>,
}

impl Node {
    /// # Errors
    ///
    /// Any executor failing to open.
    pub fn open(config: &NodeConfig) -> Result<Self> {
        let mut executors = BTreeMap::new();
        for chain in &config.chains {
            let executor = Executor::open(&config.database_path, chain.clone())
                .with_context(|| format!("opening executor for chain {}", chain.chain_id))?;
            info!(
                chain_id = %chain.chain_id,
                last_committed = ?executor.last_committed_height()?,
                "chain ready"
            );
            executors.insert(chain.chain_id, executor);
        }
        Ok(Self { executors })
    }

    /// Applies one block in its own block scope.
    ///
    /// # Errors
    ///
    /// Unknown chain or any fatal executor error; the block is rolled back.
    #[instrument(skip_all, fields(chain_id = %block.chain_id, height = block.height))]
    pub fn apply_block(&self, block: &FeedBlock) -> Result<BlockOutcome> {
        let executor = self
            .executors
            .get(&block.chain_id)
            .with_context(|| format!("chain {} is not configured", block.chain_id))?;

        if let Some(last) = executor.last_committed_height()? {
            if block.height <= last {
                info!(last, "block already committed, skipping");
                return Ok(BlockOutcome::Skipped);
            }
        }

        let mut scope = executor.new_block_scope(block.height)?;
        let mut receipts = Vec::with_capacity(block.txns.len());
        let mut failed_txns = 0;
        for (index, txn) in block.txns.iter().enumerate() {
            let result = scope
                .execute_txn_events(txn)
                .with_context(|| format!("executing txn {}", txn.txn_hash))?;
            if let Some(error) = &result.error {
                failed_txns += 1;
                warn!(txn_hash = %txn.txn_hash, event_index = ?result.error_event_index, %error, "txn failed");
            }
            receipts.push(Receipt::new(
                block.chain_id,
                block.height,
                index as u64,
                txn.txn_hash,
                &result,
            ));
        }
        scope.save_txn_receipts(&receipts)?;
        let state_hash = scope.state_hash()?;
        scope.commit()?;

        info!(txns = block.txns.len(), failed_txns, %state_hash, "block committed");
        Ok(BlockOutcome::Committed {
            state_hash,
            failed_txns,
        })
    }

    /// Applies blocks in order, stopping at the first fatal error.
    ///
    /// # Errors
    ///
    /// The first fatal error.
    pub fn run(&self, blocks: &[FeedBlock]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for block in blocks {
            match self.apply_block(block)? {
                BlockOutcome::Committed { failed_txns, .. } => {
                    summary.committed += 1;
                    summary.failed_txns += failed_txns;
                }
                BlockOutcome::Skipped => summary.skipped += 1,
            }
        }
        Ok(summary)
    }

    /// Closes every executor.
    ///
    /// # Errors
    ///
    /// The first executor that fails to close.
    pub fn close(&self) -> Result<()> {
        for (chain_id, executor) in &self.executors {
            executor
                .close()
                .with_context(|| format!("closing executor for chain {chain_id}"))?;
        }
        Ok(())
    }
}
