//! # Domain Layer
//!
//! Events, policies, privileges, limits and the error tiers of the engine.
//!
//! ## Modules
//!
//! - `entities` - Events, transaction results, receipts, registry records
//! - `policy` - Validated controller policy and its wire form
//! - `privileges` - Operation kinds and the ACL privilege bitset
//! - `config` - Per-chain execution limits
//! - `errors` - Recoverable and fatal error tiers

pub mod config;
pub mod entities;
pub mod errors;
pub mod policy;
pub mod privileges;
