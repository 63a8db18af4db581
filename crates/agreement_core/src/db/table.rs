//! Key-value table contract with conditional writes.
//!
//! # Responsibility
//! - Define the opaque table surface the store talks to.
//! - Model condition and update expressions evaluated atomically per call.
//!
//! # Invariants
//! - A conditional write either applies fully or not at all.
//! - `ConditionFailed` reports whether an item existed under the key.
//! - A missing table is reported as `TableMissing`, never created implicitly.

use crate::db::DbError;
use crate::model::item::{AttributeValue, Item};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TableResult<T> = Result<T, TableError>;

/// Outcome classification for table operations.
#[derive(Debug)]
pub enum TableError {
    /// The named table does not exist at the time of the call.
    TableMissing(String),
    /// The write condition evaluated to false; nothing was written.
    ConditionFailed { item_exists: bool },
    InvalidTableName(String),
    /// A condition or update expression referenced a missing placeholder or
    /// operated on an incompatible value.
    InvalidExpression(String),
    /// Stored payload or supplied item violates the table contract.
    InvalidData(String),
    Db(DbError),
}

impl Display for TableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TableMissing(name) => write!(f, "table `{name}` does not exist"),
            Self::ConditionFailed { item_exists } => write!(
                f,
                "conditional check failed (item_exists={item_exists})"
            ),
            Self::InvalidTableName(name) => write!(f, "invalid table name `{name}`"),
            Self::InvalidExpression(message) => write!(f, "invalid expression: {message}"),
            Self::InvalidData(message) => write!(f, "invalid table data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for TableError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Predicate evaluated against the currently stored item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    AttributeExists(String),
    AttributeNotExists(String),
    /// `attribute = :placeholder`, resolved against the call's value map.
    Equals {
        attribute: String,
        placeholder: String,
    },
    And(Vec<Condition>),
}

impl Condition {
    pub fn exists(attribute: impl Into<String>) -> Self {
        Self::AttributeExists(attribute.into())
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self::AttributeNotExists(attribute.into())
    }

    pub fn equals(attribute: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: Condition) -> Self {
        let mut parts = match self {
            Self::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Self::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        Self::And(parts)
    }

    /// Evaluates the condition. `item` is `None` when nothing is stored
    /// under the key.
    ///
    /// # Errors
    /// - `InvalidExpression` when an `Equals` placeholder is not bound.
    pub fn evaluate(&self, item: Option<&Item>, values: &Item) -> TableResult<bool> {
        match self {
            Self::AttributeExists(attribute) => {
                Ok(item.is_some_and(|item| item.contains_key(attribute)))
            }
            Self::AttributeNotExists(attribute) => {
                Ok(!item.is_some_and(|item| item.contains_key(attribute)))
            }
            Self::Equals {
                attribute,
                placeholder,
            } => {
                let expected = bound_value(values, placeholder)?;
                Ok(item
                    .and_then(|item| item.get(attribute))
                    .is_some_and(|stored| values_equal(stored, expected)))
            }
            Self::And(parts) => {
                for part in parts {
                    if !part.evaluate(item, values)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AttributeExists(attribute) => write!(f, "attribute_exists({attribute})"),
            Self::AttributeNotExists(attribute) => write!(f, "attribute_not_exists({attribute})"),
            Self::Equals {
                attribute,
                placeholder,
            } => write!(f, "{attribute} = {placeholder}"),
            Self::And(parts) => {
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

/// One clause of an update expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateAction {
    Set {
        attribute: String,
        placeholder: String,
    },
    Remove {
        attribute: String,
    },
    /// Numeric increment; initializes the attribute when absent.
    Add {
        attribute: String,
        placeholder: String,
    },
}

/// Ordered list of update clauses applied to a single item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateExpression {
    actions: Vec<UpdateAction>,
}

impl UpdateExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, attribute: impl Into<String>, placeholder: impl Into<String>) -> Self {
        self.actions.push(UpdateAction::Set {
            attribute: attribute.into(),
            placeholder: placeholder.into(),
        });
        self
    }

    pub fn remove(mut self, attribute: impl Into<String>) -> Self {
        self.actions.push(UpdateAction::Remove {
            attribute: attribute.into(),
        });
        self
    }

    pub fn add(mut self, attribute: impl Into<String>, placeholder: impl Into<String>) -> Self {
        self.actions.push(UpdateAction::Add {
            attribute: attribute.into(),
            placeholder: placeholder.into(),
        });
        self
    }

    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    /// Applies every clause to `item` in order.
    ///
    /// # Errors
    /// - `InvalidExpression` for unbound placeholders or non-numeric `ADD`.
    pub fn apply(&self, item: &mut Item, values: &Item) -> TableResult<()> {
        for action in &self.actions {
            match action {
                UpdateAction::Set {
                    attribute,
                    placeholder,
                } => {
                    let value = bound_value(values, placeholder)?;
                    item.insert(attribute.clone(), value.clone());
                }
                UpdateAction::Remove { attribute } => {
                    item.remove(attribute);
                }
                UpdateAction::Add {
                    attribute,
                    placeholder,
                } => {
                    let delta = bound_value(values, placeholder)?.as_i64().ok_or_else(|| {
                        TableError::InvalidExpression(format!(
                            "ADD {attribute} requires an integer N value for {placeholder}"
                        ))
                    })?;
                    let current = match item.get(attribute) {
                        None => 0,
                        Some(stored) => stored.as_i64().ok_or_else(|| {
                            TableError::InvalidExpression(format!(
                                "ADD {attribute} on non-integer stored value of type {}",
                                stored.type_name()
                            ))
                        })?,
                    };
                    let next = current.checked_add(delta).ok_or_else(|| {
                        TableError::InvalidExpression(format!("ADD {attribute} overflows"))
                    })?;
                    item.insert(attribute.clone(), AttributeValue::n(next));
                }
            }
        }
        Ok(())
    }
}

impl Display for UpdateExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut sets = Vec::new();
        let mut removes = Vec::new();
        let mut adds = Vec::new();
        for action in &self.actions {
            match action {
                UpdateAction::Set {
                    attribute,
                    placeholder,
                } => sets.push(format!("{attribute} = {placeholder}")),
                UpdateAction::Remove { attribute } => removes.push(attribute.clone()),
                UpdateAction::Add {
                    attribute,
                    placeholder,
                } => adds.push(format!("{attribute} {placeholder}")),
            }
        }

        let mut clauses = Vec::new();
        if !sets.is_empty() {
            clauses.push(format!("SET {}", sets.join(", ")));
        }
        if !removes.is_empty() {
            clauses.push(format!("REMOVE {}", removes.join(", ")));
        }
        if !adds.is_empty() {
            clauses.push(format!("ADD {}", adds.join(", ")));
        }
        write!(f, "{}", clauses.join(" "))
    }
}

/// Storage contract for a single keyed table.
///
/// Every write evaluates its condition and applies its mutation atomically.
/// Implementations report a missing table as `TableError::TableMissing`.
pub trait Table {
    fn table_name(&self) -> &str;

    /// Name of the string attribute used as the primary key.
    fn key_attribute(&self) -> &str;

    fn get_item(&self, key: &str) -> TableResult<Option<Item>>;

    /// Writes `item` (replacing any stored item with the same key) when
    /// `condition` holds.
    fn put_item(&self, item: &Item, condition: Option<&Condition>, values: &Item)
        -> TableResult<()>;

    /// Applies `update` to the item under `key` when `condition` holds and
    /// returns the post-update image.
    fn update_item(
        &self,
        key: &str,
        update: &UpdateExpression,
        condition: Option<&Condition>,
        values: &Item,
    ) -> TableResult<Item>;

    /// Removes the item under `key` when `condition` holds and returns the
    /// pre-delete image, if any.
    fn delete_item(
        &self,
        key: &str,
        condition: Option<&Condition>,
        values: &Item,
    ) -> TableResult<Option<Item>>;
}

fn bound_value<'a>(values: &'a Item, placeholder: &str) -> TableResult<&'a AttributeValue> {
    values.get(placeholder).ok_or_else(|| {
        TableError::InvalidExpression(format!("placeholder {placeholder} is not bound"))
    })
}

fn values_equal(stored: &AttributeValue, expected: &AttributeValue) -> bool {
    match (stored.as_i64(), expected.as_i64()) {
        (Some(left), Some(right)) => left == right,
        _ => stored == expected,
    }
}
