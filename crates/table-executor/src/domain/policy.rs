//! # Controller Policy
//!
//! Owner-configured constraints limiting what a non-owner controller's
//! statements may do.
//!
//! The registry contract hands the policy over as a loose bag of fields
//! ([`PolicyData`]). A [`Policy`] can only be obtained by validating that bag,
//! so every `Policy` in the engine is internally consistent:
//!
//! - predicates parse as exactly one SQL expression with no sub-queries,
//! - empty strings and empty column lists mean "absent",
//! - `updatable_columns` requires `allow_update`,
//! - `where_clause` only targets updates and deletes; without either it is
//!   validated and then dropped, so inserts stay unconstrained by it.

use crate::domain::privileges::Operation;
use crate::parsing::predicate::{parse_predicate, Predicate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Reasons a policy cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPolicy {
    #[error("invalid {field}: {reason}")]
    Predicate { field: &'static str, reason: String },

    #[error("updatable columns are set but updates are not allowed")]
    UpdatableColumnsWithoutUpdate,

    #[error("invalid updatable column name {0:?}")]
    InvalidColumn(String),
}

/// Wire form of a controller policy, as decoded from the registry event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyData {
    pub allow_insert: bool,
    pub allow_update: bool,
    pub allow_delete: bool,
    pub where_clause: String,
    pub with_check: String,
    pub updatable_columns: Vec<String>,
}

impl PolicyData {
    /// Everything allowed, nothing constrained.
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            allow_insert: true,
            allow_update: true,
            allow_delete: true,
            ..Self::default()
        }
    }
}

/// A validated controller policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    allow_insert: bool,
    allow_update: bool,
    allow_delete: bool,
    where_clause: Option<Predicate>,
    updatable_columns: Option<BTreeSet<String>>,
    with_check: Option<Predicate>,
}

impl Policy {
    /// The unrestricted policy.
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            allow_insert: true,
            allow_update: true,
            allow_delete: true,
            where_clause: None,
            updatable_columns: None,
            with_check: None,
        }
    }

    #[must_use]
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    /// Whether the policy permits the given operation kind.
    #[must_use]
    pub fn allows(&self, operation: Operation) -> bool {
        match operation {
            Operation::Insert => self.allow_insert,
            Operation::Update => self.allow_update,
            Operation::Delete => self.allow_delete,
        }
    }

    /// Predicate conjoined into UPDATE/DELETE targeting.
    #[must_use]
    pub fn where_clause(&self) -> Option<&Predicate> {
        self.where_clause.as_ref()
    }

    /// Columns an UPDATE may assign; `None` means any column.
    #[must_use]
    pub fn updatable_columns(&self) -> Option<&BTreeSet<String>> {
        self.updatable_columns.as_ref()
    }

    /// Post-execution audit predicate.
    #[must_use]
    pub fn with_check(&self) -> Option<&Predicate> {
        self.with_check.as_ref()
    }
}

impl TryFrom<PolicyData> for Policy {
    type Error = InvalidPolicy;

    fn try_from(data: PolicyData) -> Result<Self, Self::Error> {
        let mut builder = Policy::builder()
            .allow_insert(data.allow_insert)
            .allow_update(data.allow_update)
            .allow_delete(data.allow_delete)
            .updatable_columns(data.updatable_columns);
        if !data.where_clause.trim().is_empty() {
            builder = builder.where_clause(data.where_clause);
        }
        if !data.with_check.trim().is_empty() {
            builder = builder.with_check(data.with_check);
        }
        builder.build()
    }
}

impl TryFrom<&PolicyData> for Policy {
    type Error = InvalidPolicy;

    fn try_from(data: &PolicyData) -> Result<Self, Self::Error> {
        Policy::try_from(data.clone())
    }
}

/// Builder for [`Policy`]; all validation happens in [`PolicyBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    allow_insert: bool,
    allow_update: bool,
    allow_delete: bool,
    where_clause: Option<String>,
    updatable_columns: Vec<String>,
    with_check: Option<String>,
}

impl PolicyBuilder {
    #[must_use]
    pub fn allow_insert(mut self, allow: bool) -> Self {
        self.allow_insert = allow;
        self
    }

    #[must_use]
    pub fn allow_update(mut self, allow: bool) -> Self {
        self.allow_update = allow;
        self
    }

    #[must_use]
    pub fn allow_delete(mut self, allow: bool) -> Self {
        self.allow_delete = allow;
        self
    }

    #[must_use]
    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    #[must_use]
    pub fn updatable_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.updatable_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_check(mut self, check: impl Into<String>) -> Self {
        self.with_check = Some(check.into());
        self
    }

    /// Validates the collected fields.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPolicy`] for unparsable predicates, malformed column
    /// names, or contradictory permission combinations.
    pub fn build(self) -> Result<Policy, InvalidPolicy> {
        let targets_rows = self.allow_update || self.allow_delete;
        let where_clause = self
            .where_clause
            .as_deref()
            .map(|text| {
                parse_predicate(text).map_err(|e| InvalidPolicy::Predicate {
                    field: "where clause",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let with_check = self
            .with_check
            .as_deref()
            .map(|text| {
                parse_predicate(text).map_err(|e| InvalidPolicy::Predicate {
                    field: "with check",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let mut columns = BTreeSet::new();
        for column in self.updatable_columns {
            let name = column.trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(InvalidPolicy::InvalidColumn(column));
            }
            columns.insert(name.to_ascii_lowercase());
        }
        let updatable_columns = (!columns.is_empty()).then_some(columns);

        if updatable_columns.is_some() && !self.allow_update {
            return Err(InvalidPolicy::UpdatableColumnsWithoutUpdate);
        }
        Ok(Policy {
            allow_insert: self.allow_insert,
            allow_update: self.allow_update,
            allow_delete: self.allow_delete,
            where_clause: where_clause.filter(|_| targets_rows),
            updatable_columns,
            with_check,
        })
    }
}
