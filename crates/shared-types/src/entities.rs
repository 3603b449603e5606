//! # Core Identifiers
//!
//! - `ChainId` scopes every table and system row to one network.
//! - `TableId` is the registry's uint256 token id.
//! - `Address` is a 20-byte account address (table owners, controllers).
//! - `TxnHash` identifies the chain transaction that carried a set of events.

use crate::errors::IdParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export U256 from primitive-types for callers building table ids
pub use primitive_types::U256;

// =============================================================================
// CHAIN ID
// =============================================================================

/// Identifier of the origin blockchain network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub i64);

impl ChainId {
    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChainId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

// =============================================================================
// TABLE ID
// =============================================================================

/// Arbitrary-precision non-negative table identifier.
///
/// The canonical text form is the decimal representation, which is also the
/// suffix of the table's SQL name (`{prefix}_{chain_id}_{table_id}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableId(U256);

impl TableId {
    /// Wraps a `U256`.
    #[must_use]
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Returns the underlying integer.
    #[must_use]
    pub const fn as_u256(&self) -> &U256 {
        &self.0
    }
}

impl From<u64> for TableId {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for TableId {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl FromStr for TableId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdParseError::InvalidTableId(s.to_string()));
        }
        U256::from_dec_str(s)
            .map(Self)
            .map_err(|_| IdParseError::InvalidTableId(s.to_string()))
    }
}

impl TryFrom<String> for TableId {
    type Error = IdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TableId> for String {
    fn from(id: TableId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// ADDRESS (20 bytes)
// =============================================================================

/// A 20-byte account address.
///
/// Displayed as lowercase `0x`-prefixed hex; this is the form persisted in
/// the registry, controller and ACL tables.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address (0x0000...0000).
    pub const ZERO: Self = Self([0u8; 20]);

    /// Creates an address from a 20-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns true if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = IdParseError;

    /// Accepts up to 40 hex digits with an optional `0x` prefix. Short inputs
    /// are left-padded with zeros, so `0x1` is the address ending in `01`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_padded::<20>(s, "address").map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = IdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// =============================================================================
// TRANSACTION HASH (32 bytes)
// =============================================================================

/// Hash of the chain transaction that carried a list of events.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxnHash(pub [u8; 32]);

impl TxnHash {
    /// Creates a hash from a 32-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for TxnHash {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_padded::<32>(s, "transaction hash").map(Self)
    }
}

impl TryFrom<String> for TxnHash {
    type Error = IdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TxnHash> for String {
    fn from(hash: TxnHash) -> Self {
        hash.to_string()
    }
}

impl fmt::Display for TxnHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxnHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn decode_padded<const N: usize>(s: &str, kind: &'static str) -> Result<[u8; N], IdParseError> {
    let invalid = || IdParseError::InvalidHex {
        kind,
        value: s.to_string(),
        expected_len: N,
    };

    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() || digits.len() > N * 2 {
        return Err(invalid());
    }

    let padded = format!("{digits:0>width$}", width = N * 2);
    let decoded = hex::decode(padded).map_err(|_| invalid())?;

    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_id_decimal_roundtrip() {
        let id: TableId = "100".parse().unwrap();
        assert_eq!(id, TableId::from(100u64));
        assert_eq!(id.to_string(), "100");

        let big = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        let id: TableId = big.parse().unwrap();
        assert_eq!(id.to_string(), big);
    }

    #[test]
    fn test_table_id_rejects_non_decimal() {
        assert!("".parse::<TableId>().is_err());
        assert!("-1".parse::<TableId>().is_err());
        assert!("0x10".parse::<TableId>().is_err());
        assert!("1e3".parse::<TableId>().is_err());
    }

    #[test]
    fn test_address_parsing_is_case_insensitive() {
        let lower: Address = "0xd43c59d5694ec111eb9e986c233200b14249558d".parse().unwrap();
        let mixed: Address = "0xD43C59d5694eC111Eb9e986C233200b14249558D".parse().unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(mixed.to_string(), "0xd43c59d5694ec111eb9e986c233200b14249558d");
    }

    #[test]
    fn test_short_address_is_left_padded() {
        let addr: Address = "0x1".parse().unwrap();
        assert!(!addr.is_zero());
        assert_eq!(addr.as_bytes()[19], 1);
        assert_eq!(addr.as_bytes()[..19], [0u8; 19]);
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!("0x".parse::<Address>().is_err());
        assert!("0xzz".parse::<Address>().is_err());
        assert!(format!("0x{}", "1".repeat(41)).parse::<Address>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_strings() {
        let id = TableId::from(42u64);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");

        let addr: Address = serde_json::from_str("\"0x1\"").unwrap();
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"0x0000000000000000000000000000000000000001\""
        );
    }
}
