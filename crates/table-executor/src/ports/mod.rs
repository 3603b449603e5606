//! # Ports Layer
//!
//! - `inbound.rs` - Driving ports (executor and block scope API)
//! - `outbound.rs` - Driven ports (ACL and system-table persistence)

pub mod inbound;
pub mod outbound;
