//! # Privileges
//!
//! Write operations and the privilege bitset stored in `system_acl`.
//!
//! | Privilege | Bit |
//! |-----------|-----|
//! | insert    | 1   |
//! | update    | 2   |
//! | delete    | 4   |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The effective kind of a mutating statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// The privilege a controller must hold to run this operation.
    #[must_use]
    pub const fn required_privilege(self) -> Privilege {
        match self {
            Self::Insert => Privilege::Insert,
            Self::Update => Privilege::Update,
            Self::Delete => Privilege::Delete,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A single grantable privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Insert,
    Update,
    Delete,
}

impl Privilege {
    /// All privileges in bit order.
    pub const ALL: [Privilege; 3] = [Self::Insert, Self::Update, Self::Delete];

    const fn bit(self) -> u8 {
        match self {
            Self::Insert => 0b001,
            Self::Update => 0b010,
            Self::Delete => 0b100,
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown privilege {other}")),
        }
    }
}

/// A set of privileges, persisted as a bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Privileges(u8);

impl Privileges {
    /// The empty set.
    pub const NONE: Self = Self(0);

    /// Insert, update and delete.
    pub const ALL: Self = Self(0b111);

    /// Builds a set from its persisted bitset, ignoring unknown bits.
    #[must_use]
    pub const fn from_bits(bits: i64) -> Self {
        Self((bits & 0b111) as u8)
    }

    /// The persisted bitset.
    #[must_use]
    pub const fn bits(self) -> i64 {
        self.0 as i64
    }

    #[must_use]
    pub const fn contains(self, privilege: Privilege) -> bool {
        self.0 & privilege.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set union; used by grant.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set difference; used by revoke. Never underflows.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterates the held privileges in bit order.
    pub fn iter(self) -> impl Iterator<Item = Privilege> {
        Privilege::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<Privilege> for Privileges {
    fn from_iter<I: IntoIterator<Item = Privilege>>(iter: I) -> Self {
        Self(iter.into_iter().fold(0, |acc, p| acc | p.bit()))
    }
}

impl From<Privilege> for Privileges {
    fn from(privilege: Privilege) -> Self {
        Self(privilege.bit())
    }
}

impl fmt::Display for Privileges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|p| p.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

impl Serialize for Privileges {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for Privileges {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let privileges = Vec::<Privilege>::deserialize(deserializer)?;
        Ok(privileges.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_then_partial_revoke_leaves_update() {
        let granted = Privileges::NONE.union(Privileges::ALL);
        let revoked: Privileges = [Privilege::Insert, Privilege::Delete].into_iter().collect();
        let left = granted.difference(revoked);

        assert!(left.contains(Privilege::Update));
        assert!(!left.contains(Privilege::Insert));
        assert!(!left.contains(Privilege::Delete));
        assert_eq!(left.iter().collect::<Vec<_>>(), vec![Privilege::Update]);
    }

    #[test]
    fn test_revoke_of_unheld_privilege_is_noop() {
        let held = Privileges::from(Privilege::Update);
        assert_eq!(held.difference(Privilege::Insert.into()), held);
        assert!(Privileges::NONE.difference(Privileges::ALL).is_empty());
    }

    #[test]
    fn test_bits_roundtrip_masks_unknown_bits() {
        assert_eq!(Privileges::from_bits(0b1111_0110).bits(), 0b110);
        assert_eq!(Privileges::ALL.bits(), 7);
    }

    #[test]
    fn test_privileges_serde() {
        let json = serde_json::to_string(&Privileges::ALL).unwrap();
        assert_eq!(json, r#"["insert","update","delete"]"#);
        let back: Privileges = serde_json::from_str(r#"["delete","insert"]"#).unwrap();
        assert!(back.contains(Privilege::Delete) && back.contains(Privilege::Insert));
    }
}
