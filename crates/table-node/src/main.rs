//! `table-node`: applies a block feed to the configured chains.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use table_node::{load_feed, logging, Node, NodeConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "table-node")]
#[command(about = "Applies registry events to the tables database, one transaction per block")]
struct Args {
    /// Node configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// JSON block feed to apply
    #[arg(short, long)]
    feed: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = NodeConfig::load(&args.config)?;
    logging::init(&config.log)?;

    info!(
        database = %config.database_path.display(),
        chains = config.chains.len(),
        "starting table node"
    );

    let blocks = load_feed(&args.feed)?;
    let node = Node::open(&config)?;

    let outcome = node.run(&blocks);
    let closed = node.close();

    match outcome {
        Ok(summary) => {
            info!(
                committed = summary.committed,
                skipped = summary.skipped,
                failed_txns = summary.failed_txns,
                "feed applied"
            );
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "ingestion halted");
            return Err(err).context("applying feed");
        }
    }
    closed
}
