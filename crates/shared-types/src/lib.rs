//! # Shared Types Crate
//!
//! Identifiers that cross the boundary between the event feed, the execution
//! engine and the runtime binary.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every crate names chains, tables and
//!   addresses through the types defined here.
//! - **Canonical text form**: each identifier has exactly one string form,
//!   which is what ends up in SQL tables and JSON feeds.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
