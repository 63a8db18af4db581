//! Storage item representation.
//!
//! # Responsibility
//! - Model table items as attribute-name -> typed-value maps.
//! - Provide typed, non-panicking accessors for codec lookups.
//!
//! # Invariants
//! - String sets are kept sorted and de-duplicated.
//! - Numbers are carried as decimal strings, parsed only on read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored record: attribute name to typed value.
///
/// Also used for named-placeholder value maps (`:v`, `:t`, ...) passed to
/// conditional writes.
pub type Item = BTreeMap<String, AttributeValue>;

/// Typed scalar/collection value stored under one attribute.
///
/// Serialized in tagged form, e.g. `{"S": "alice"}` or `{"N": "3"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null,
}

impl AttributeValue {
    pub fn s(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    pub fn n(value: i64) -> Self {
        Self::N(value.to_string())
    }

    /// Builds a string set, sorting and removing duplicates.
    pub fn ss<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = values.into_iter().map(Into::into).collect::<Vec<String>>();
        values.sort();
        values.dedup();
        Self::Ss(values)
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the number parsed as `i64`, `None` for other tags or
    /// non-integer payloads.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::N(value) => value.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_ss(&self) -> Option<&[String]> {
        match self {
            Self::Ss(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short tag name used in diagnostics (`S`, `N`, `SS`, `BOOL`, `NULL`).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::Ss(_) => "SS",
            Self::Bool(_) => "BOOL",
            Self::Null => "NULL",
        }
    }
}
