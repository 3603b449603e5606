//! # Error Types
//!
//! Parsing errors for the shared identifiers.

use thiserror::Error;

/// Errors produced when decoding an identifier from its text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    /// Table ids are non-negative decimal integers.
    #[error("invalid table id {0:?}: expected a non-negative decimal integer")]
    InvalidTableId(String),

    /// Hex strings must carry the expected number of bytes.
    #[error("invalid {kind} {value:?}: expected {expected_len} hex-encoded bytes")]
    InvalidHex {
        kind: &'static str,
        value: String,
        expected_len: usize,
    },
}
