//! Agreement store with optimistic concurrency control.
//!
//! # Responsibility
//! - Provide create/get/update/delete over a `Table`.
//! - Own identifier minting, the conditional-write protocol and the error
//!   taxonomy surfaced to request handlers.
//!
//! # Invariants
//! - Create is guarded by `attribute_not_exists(xref)` and retried on
//!   collision at most `MAX_CREATE_ATTEMPTS` times in total.
//! - Update is guarded by `attribute_exists(xref) AND version = :v` and
//!   increments `version` in the same atomic write.
//! - Delete is guarded by `attribute_exists(xref)`.
//! - Update and delete are never retried here.

use crate::codec::agreement_codec::{
    self, attr, CodecError, WhenAbsent, EXPECTED_VERSION, UPDATE_BINDINGS,
};
use crate::db::table::{Condition, Table, TableError, UpdateExpression};
use crate::model::agreement::{Agreement, AgreementRequest, ValidationError};
use crate::model::item::{AttributeValue, Item};
use chrono::Utc;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Total create attempts before giving up on identifier collisions.
pub const MAX_CREATE_ATTEMPTS: u32 = 3;

const VERSION_INCREMENT: &str = ":one";

pub type StoreResult<T> = Result<T, StoreError>;

/// Which conditional write lost its race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The record vanished or the observed version was stale.
    Update,
    /// The record changed while the delete was in flight.
    Delete,
}

/// Error taxonomy surfaced by `AgreementStore`.
#[derive(Debug)]
pub enum StoreError {
    /// Caller error detected before I/O.
    Validation(ValidationError),
    NotFound(String),
    Conflict { kind: ConflictKind, xref: String },
    TableMissing(String),
    /// Identifier collisions exhausted every create attempt.
    CreationFailed { attempts: u32 },
    /// The table broke its own contract (e.g. a successful delete with no
    /// prior image). Never retried.
    Inconsistent(String),
    /// Stored item does not match the agreement shape.
    Codec(CodecError),
    Table(TableError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(xref) => write!(f, "Agreement {xref} does not exist"),
            Self::Conflict {
                kind: ConflictKind::Update,
                ..
            } => write!(
                f,
                "Either the agreement did not exist or the provided version was not current"
            ),
            Self::Conflict {
                kind: ConflictKind::Delete,
                ..
            } => write!(
                f,
                "A competing request changed the agreement while processing this request"
            ),
            Self::TableMissing(table) => write!(f, "Agreement table {table} does not exist"),
            Self::CreationFailed { attempts } => write!(
                f,
                "Unable to generate unique agreement id after {attempts} tries"
            ),
            Self::Inconsistent(message) => write!(f, "{message}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Table(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Table(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CodecError> for StoreError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<TableError> for StoreError {
    fn from(value: TableError) -> Self {
        match value {
            TableError::TableMissing(table) => Self::TableMissing(table),
            other => Self::Table(other),
        }
    }
}

/// Agreement data access over one keyed table.
///
/// Holds no mutable state between calls; all state lives in the table.
pub struct AgreementStore<T: Table> {
    table: T,
}

impl<T: Table> AgreementStore<T> {
    /// Creates a store over `table`, keyed by `xref`.
    pub fn new(table: T) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Creates an agreement with freshly minted identifiers at version 1.
    ///
    /// Returns the decoded view of the item just written.
    ///
    /// # Errors
    /// - `Validation` for a missing creator or mandatory field.
    /// - `TableMissing` immediately, without retry.
    /// - `CreationFailed` after `MAX_CREATE_ATTEMPTS` collisions.
    pub fn create(&self, request: &AgreementRequest) -> StoreResult<Agreement> {
        let started_at = Instant::now();
        let condition = Condition::not_exists(attr::XREF);
        let no_values = Item::new();

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let item = agreement_codec::create_item(request, Utc::now())?;
            match self.table.put_item(&item, Some(&condition), &no_values) {
                Ok(()) => {
                    let agreement = decode(&item, "create")?;
                    info!(
                        "event=agreement_create module=store status=ok xref={} attempts={} duration_ms={}",
                        agreement.xref,
                        attempt,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(agreement);
                }
                Err(TableError::ConditionFailed { .. }) => {
                    warn!(
                        "event=agreement_create module=store status=retry attempt={} max_attempts={} error_code=xref_collision",
                        attempt, MAX_CREATE_ATTEMPTS
                    );
                }
                Err(err) => return Err(self.failed("agreement_create", err.into())),
            }
        }

        Err(self.failed(
            "agreement_create",
            StoreError::CreationFailed {
                attempts: MAX_CREATE_ATTEMPTS,
            },
        ))
    }

    /// Reads an agreement by external reference.
    ///
    /// # Errors
    /// - `NotFound` when nothing (or an empty item) is stored under `xref`.
    /// - `TableMissing` when the table is absent.
    pub fn get(&self, xref: &str) -> StoreResult<Agreement> {
        require_xref(Some(xref))?;
        let item = self
            .table
            .get_item(xref)
            .map_err(|err| self.failed("agreement_get", err.into()))?;
        let Some(item) = item else {
            return Err(StoreError::NotFound(xref.to_string()));
        };
        agreement_codec::item_to_agreement(&item)
            .map_err(|err| self.failed("agreement_get", err.into()))?
            .ok_or_else(|| StoreError::NotFound(xref.to_string()))
    }

    /// Replaces the mutable fields of an agreement when the caller's observed
    /// version is current, returning the post-update snapshot.
    ///
    /// # Errors
    /// - `Validation` for a missing xref, version or mandatory field.
    /// - `Conflict` when the record is gone or the version is stale; the two
    ///   causes are not distinguished.
    /// - `TableMissing` when the table is absent.
    pub fn update(&self, request: &AgreementRequest) -> StoreResult<Agreement> {
        let started_at = Instant::now();
        let xref = require_xref(request.xref.as_deref())?;
        let mut values = agreement_codec::update_values(request)?;
        values.insert(VERSION_INCREMENT.to_string(), AttributeValue::n(1));

        let update = update_expression(&values);
        let condition =
            Condition::exists(attr::XREF).and(Condition::equals(attr::VERSION, EXPECTED_VERSION));

        let item = match self
            .table
            .update_item(xref, &update, Some(&condition), &values)
        {
            Ok(item) => item,
            Err(TableError::ConditionFailed { item_exists }) => {
                info!(
                    "event=agreement_update module=store status=conflict xref={} item_exists={}",
                    xref, item_exists
                );
                return Err(StoreError::Conflict {
                    kind: ConflictKind::Update,
                    xref: xref.to_string(),
                });
            }
            Err(err) => return Err(self.failed("agreement_update", err.into())),
        };

        let agreement =
            decode(&item, "update").map_err(|err| self.failed("agreement_update", err))?;
        info!(
            "event=agreement_update module=store status=ok xref={} version={} duration_ms={}",
            agreement.xref,
            agreement.version,
            started_at.elapsed().as_millis()
        );
        Ok(agreement)
    }

    /// Deletes an agreement and returns its pre-delete snapshot.
    ///
    /// The guard is `attribute_exists(xref)` alone, so of two racing deletes
    /// the loser sees `NotFound`. `Conflict` is reported only by tables that
    /// fail the guard while the item is still present.
    ///
    /// # Errors
    /// - `NotFound` when nothing is stored under `xref`.
    /// - `Conflict` when the condition failed with the record present.
    /// - `TableMissing` when the table is absent.
    /// - `Inconsistent` when the delete passed its condition but the table
    ///   returned no prior image.
    pub fn delete(&self, xref: &str) -> StoreResult<Agreement> {
        let started_at = Instant::now();
        require_xref(Some(xref))?;
        let condition = Condition::exists(attr::XREF);

        let previous = match self.table.delete_item(xref, Some(&condition), &Item::new()) {
            Ok(previous) => previous,
            Err(TableError::ConditionFailed { item_exists: false }) => {
                return Err(StoreError::NotFound(xref.to_string()));
            }
            Err(TableError::ConditionFailed { item_exists: true }) => {
                info!(
                    "event=agreement_delete module=store status=conflict xref={}",
                    xref
                );
                return Err(StoreError::Conflict {
                    kind: ConflictKind::Delete,
                    xref: xref.to_string(),
                });
            }
            Err(err) => return Err(self.failed("agreement_delete", err.into())),
        };

        let previous = previous.unwrap_or_default();
        let agreement =
            decode(&previous, "delete").map_err(|err| self.failed("agreement_delete", err))?;
        info!(
            "event=agreement_delete module=store status=ok xref={} version={} duration_ms={}",
            agreement.xref,
            agreement.version,
            started_at.elapsed().as_millis()
        );
        Ok(agreement)
    }

    fn failed(&self, event: &str, err: StoreError) -> StoreError {
        match &err {
            StoreError::Inconsistent(_) | StoreError::Codec(_) | StoreError::Table(_) => error!(
                "event={} module=store status=error table={} error={}",
                event,
                self.table.table_name(),
                err
            ),
            _ => warn!(
                "event={} module=store status=error table={} error={}",
                event,
                self.table.table_name(),
                err
            ),
        }
        err
    }
}

/// Builds the update expression from the bound placeholders.
fn update_expression(values: &Item) -> UpdateExpression {
    let mut update = UpdateExpression::new();
    for binding in UPDATE_BINDINGS {
        if values.contains_key(binding.placeholder) {
            update = update.set(binding.attribute, binding.placeholder);
        } else if binding.when_absent == WhenAbsent::Remove {
            update = update.remove(binding.attribute);
        }
    }
    update.add(attr::VERSION, VERSION_INCREMENT)
}

fn require_xref(xref: Option<&str>) -> Result<&str, ValidationError> {
    xref.filter(|xref| !xref.is_empty())
        .ok_or(ValidationError::EmptyXref)
}

/// Decodes an item the table reported as written; an empty item here means
/// the table broke its contract.
fn decode(item: &Item, operation: &str) -> StoreResult<Agreement> {
    agreement_codec::item_to_agreement(item)?.ok_or_else(|| {
        StoreError::Inconsistent(format!(
            "Condition passed but {operation} returned no agreement item"
        ))
    })
}
