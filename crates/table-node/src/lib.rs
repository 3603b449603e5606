//! # Table Node
//!
//! Runtime around [`table_executor`]: configuration, logging setup and block
//! feed ingestion.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `CT_DATABASE_PATH`)
//! 2. Install the tracing subscriber
//! 3. Open one executor per configured chain
//! 4. Apply the feed block by block, skipping already committed heights
//! 5. Close every executor

pub mod config;
pub mod feed;
pub mod logging;

pub use config::{LogConfig, NodeConfig};
pub use feed::{load_feed, BlockOutcome, FeedBlock, Node, RunSummary};
