//! Mapping between stored agreement items and domain snapshots.
//!
//! # Responsibility
//! - Decode stored items into `Agreement` snapshots, rejecting invalid
//!   persisted state instead of masking it.
//! - Build the full create item and the update placeholder map from a
//!   caller request.
//!
//! # Invariants
//! - Mandatory request fields are checked before any storage I/O.
//! - Optional attributes decode to `None` when absent or `NULL`.
//! - Timestamps are stored as RFC 3339 UTC strings with millisecond precision.

use crate::model::agreement::{Agreement, AgreementRequest, ValidationError};
use crate::model::item::{AttributeValue, Item};
use chrono::{DateTime, SecondsFormat, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stored attribute names.
pub mod attr {
    pub const AGREEMENT_ID: &str = "agreementId";
    pub const XREF: &str = "xref";
    pub const VERSION: &str = "version";
    pub const CREATOR_XREF: &str = "creatorXref";
    pub const PARTICIPANTS: &str = "participants";
    pub const COMMISSIONER_XREF: &str = "commissionerXref";
    pub const CREATED_AT: &str = "createdAt";
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const CONDITIONS: &str = "conditions";
    pub const PUNISHMENT: &str = "punishment";
    pub const CONDITIONS_DEADLINE: &str = "conditionsDeadline";
    pub const PUNISHMENT_DEADLINE: &str = "punishmentDeadline";
    pub const RESULT_XREF: &str = "resultXref";
    pub const COMMENTS: &str = "comments";
    pub const IS_COMPLETE: &str = "isComplete";
}

/// Placeholder bound to the caller's observed version in update conditions.
pub const EXPECTED_VERSION: &str = ":v";

/// What an update does with an attribute whose placeholder is not bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenAbsent {
    /// Leave the stored value untouched.
    Keep,
    /// Remove the attribute from the stored item.
    Remove,
}

/// Maps one mutable attribute to its update placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateBinding {
    pub attribute: &'static str,
    pub placeholder: &'static str,
    pub when_absent: WhenAbsent,
}

/// Mutable attributes replaced by an update, in expression order.
///
/// Mandatory fields are always bound by `update_values`, so their
/// `when_absent` never applies.
pub const UPDATE_BINDINGS: &[UpdateBinding] = &[
    binding(attr::COMMISSIONER_XREF, ":comxref", WhenAbsent::Keep),
    binding(attr::TITLE, ":t", WhenAbsent::Keep),
    binding(attr::DESCRIPTION, ":des", WhenAbsent::Remove),
    binding(attr::CONDITIONS, ":con", WhenAbsent::Keep),
    binding(attr::PUNISHMENT, ":pun", WhenAbsent::Keep),
    binding(attr::CONDITIONS_DEADLINE, ":cond", WhenAbsent::Keep),
    binding(attr::PUNISHMENT_DEADLINE, ":pund", WhenAbsent::Keep),
    binding(attr::RESULT_XREF, ":rxref", WhenAbsent::Remove),
    binding(attr::IS_COMPLETE, ":com", WhenAbsent::Remove),
];

const fn binding(
    attribute: &'static str,
    placeholder: &'static str,
    when_absent: WhenAbsent,
) -> UpdateBinding {
    UpdateBinding {
        attribute,
        placeholder,
        when_absent,
    }
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Persisted item violates the agreement storage shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    MissingAttribute(&'static str),
    WrongType {
        attribute: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    InvalidValue {
        attribute: &'static str,
        message: String,
    },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingAttribute(attribute) => {
                write!(f, "stored agreement is missing `{attribute}`")
            }
            Self::WrongType {
                attribute,
                expected,
                found,
            } => write!(
                f,
                "stored agreement `{attribute}` has type {found}, expected {expected}"
            ),
            Self::InvalidValue { attribute, message } => {
                write!(f, "stored agreement `{attribute}` is invalid: {message}")
            }
        }
    }
}

impl Error for CodecError {}

/// Decodes a stored item.
///
/// Returns `Ok(None)` for an empty item.
///
/// # Errors
/// - `CodecError` when a required attribute is absent, mistyped or invalid.
pub fn item_to_agreement(item: &Item) -> CodecResult<Option<Agreement>> {
    if item.is_empty() {
        return Ok(None);
    }

    let agreement = Agreement {
        xref: required_non_empty(item, attr::XREF)?,
        creator_xref: required_non_empty(item, attr::CREATOR_XREF)?,
        participants: required_ss(item, attr::PARTICIPANTS)?,
        commissioner_xref: required_s(item, attr::COMMISSIONER_XREF)?,
        created_at: required_timestamp(item, attr::CREATED_AT)?,
        title: required_s(item, attr::TITLE)?,
        description: optional_s(item, attr::DESCRIPTION)?,
        conditions: required_s(item, attr::CONDITIONS)?,
        punishment: required_s(item, attr::PUNISHMENT)?,
        conditions_deadline: required_timestamp(item, attr::CONDITIONS_DEADLINE)?,
        punishment_deadline: required_timestamp(item, attr::PUNISHMENT_DEADLINE)?,
        result_xref: optional_s(item, attr::RESULT_XREF)?,
        comments: optional_ss(item, attr::COMMENTS)?,
        is_complete: optional_bool(item, attr::IS_COMPLETE)?,
        version: required_version(item)?,
    };
    Ok(Some(agreement))
}

/// Builds the placeholder value map for a conditional update.
///
/// Binds `:v` to the caller's observed version. Optional fields are bound
/// only when present; see `UPDATE_BINDINGS` for how absence is applied.
///
/// # Errors
/// - `MissingField` for the first absent mandatory field, in the order
///   title, conditions, punishment, conditionsDeadline, punishmentDeadline,
///   then version.
pub fn update_values(request: &AgreementRequest) -> Result<Item, ValidationError> {
    let mut values = Item::new();

    if let Some(commissioner) = non_blank(request.commissioner_xref.as_deref()) {
        values.insert(":comxref".to_string(), AttributeValue::s(commissioner));
    }
    values.insert(
        ":t".to_string(),
        AttributeValue::s(mandatory_text(request.title.as_deref(), attr::TITLE)?),
    );
    if let Some(description) = request.description.as_deref() {
        values.insert(":des".to_string(), AttributeValue::s(description));
    }
    values.insert(
        ":con".to_string(),
        AttributeValue::s(mandatory_text(request.conditions.as_deref(), attr::CONDITIONS)?),
    );
    values.insert(
        ":pun".to_string(),
        AttributeValue::s(mandatory_text(request.punishment.as_deref(), attr::PUNISHMENT)?),
    );
    values.insert(
        ":cond".to_string(),
        timestamp_value(mandatory(request.conditions_deadline, attr::CONDITIONS_DEADLINE)?),
    );
    values.insert(
        ":pund".to_string(),
        timestamp_value(mandatory(request.punishment_deadline, attr::PUNISHMENT_DEADLINE)?),
    );
    if let Some(result_xref) = request.result_xref.as_deref() {
        values.insert(":rxref".to_string(), AttributeValue::s(result_xref));
    }
    if let Some(is_complete) = request.is_complete {
        values.insert(":com".to_string(), AttributeValue::Bool(is_complete));
    }
    values.insert(
        EXPECTED_VERSION.to_string(),
        AttributeValue::n(mandatory(request.version, attr::VERSION)?),
    );

    Ok(values)
}

/// Builds the full item persisted by create.
///
/// Mints a fresh internal id and a fresh external reference on every call,
/// so retried creates never reuse identifiers.
///
/// # Errors
/// - `EmptyId` when the creator reference is absent or empty.
/// - `MissingField` for the first absent mandatory field.
pub fn create_item(
    request: &AgreementRequest,
    created_at: DateTime<Utc>,
) -> Result<Item, ValidationError> {
    let creator = non_blank(request.creator_xref.as_deref()).ok_or(ValidationError::EmptyId)?;

    let mut item = Item::new();
    item.insert(
        attr::AGREEMENT_ID.to_string(),
        AttributeValue::s(Uuid::new_v4().to_string()),
    );
    item.insert(attr::XREF.to_string(), AttributeValue::s(Uuid::new_v4().to_string()));
    item.insert(attr::VERSION.to_string(), AttributeValue::n(1));
    item.insert(attr::CREATOR_XREF.to_string(), AttributeValue::s(creator));
    item.insert(
        attr::PARTICIPANTS.to_string(),
        AttributeValue::ss(request.participants.iter().flatten().cloned()),
    );
    let commissioner = non_blank(request.commissioner_xref.as_deref()).unwrap_or(creator);
    item.insert(
        attr::COMMISSIONER_XREF.to_string(),
        AttributeValue::s(commissioner),
    );
    item.insert(attr::CREATED_AT.to_string(), timestamp_value(created_at));
    item.insert(
        attr::TITLE.to_string(),
        AttributeValue::s(mandatory_text(request.title.as_deref(), attr::TITLE)?),
    );
    if let Some(description) = request.description.as_deref() {
        item.insert(attr::DESCRIPTION.to_string(), AttributeValue::s(description));
    }
    item.insert(
        attr::CONDITIONS.to_string(),
        AttributeValue::s(mandatory_text(request.conditions.as_deref(), attr::CONDITIONS)?),
    );
    item.insert(
        attr::PUNISHMENT.to_string(),
        AttributeValue::s(mandatory_text(request.punishment.as_deref(), attr::PUNISHMENT)?),
    );
    item.insert(
        attr::CONDITIONS_DEADLINE.to_string(),
        timestamp_value(mandatory(request.conditions_deadline, attr::CONDITIONS_DEADLINE)?),
    );
    item.insert(
        attr::PUNISHMENT_DEADLINE.to_string(),
        timestamp_value(mandatory(request.punishment_deadline, attr::PUNISHMENT_DEADLINE)?),
    );
    if let Some(result_xref) = request.result_xref.as_deref() {
        item.insert(attr::RESULT_XREF.to_string(), AttributeValue::s(result_xref));
    }
    if let Some(comments) = request.comments.as_ref() {
        item.insert(
            attr::COMMENTS.to_string(),
            AttributeValue::ss(comments.iter().cloned()),
        );
    }
    if let Some(is_complete) = request.is_complete {
        item.insert(attr::IS_COMPLETE.to_string(), AttributeValue::Bool(is_complete));
    }

    Ok(item)
}

/// Formats a timestamp the way it is stored.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn timestamp_value(value: DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(format_timestamp(value))
}

fn mandatory<T>(value: Option<T>, field: &'static str) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::MissingField(field))
}

fn mandatory_text<'a>(
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    non_blank(value).ok_or(ValidationError::MissingField(field))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

fn lookup<'a>(item: &'a Item, attribute: &'static str) -> CodecResult<&'a AttributeValue> {
    item.get(attribute)
        .ok_or(CodecError::MissingAttribute(attribute))
}

fn wrong_type(
    attribute: &'static str,
    expected: &'static str,
    found: &AttributeValue,
) -> CodecError {
    CodecError::WrongType {
        attribute,
        expected,
        found: found.type_name(),
    }
}

fn required_s(item: &Item, attribute: &'static str) -> CodecResult<String> {
    let value = lookup(item, attribute)?;
    value
        .as_s()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(attribute, "S", value))
}

fn required_non_empty(item: &Item, attribute: &'static str) -> CodecResult<String> {
    let value = required_s(item, attribute)?;
    if value.is_empty() {
        return Err(CodecError::InvalidValue {
            attribute,
            message: "must not be empty".to_string(),
        });
    }
    Ok(value)
}

fn required_ss(item: &Item, attribute: &'static str) -> CodecResult<Vec<String>> {
    let value = lookup(item, attribute)?;
    value
        .as_ss()
        .map(<[String]>::to_vec)
        .ok_or_else(|| wrong_type(attribute, "SS", value))
}

fn required_timestamp(item: &Item, attribute: &'static str) -> CodecResult<DateTime<Utc>> {
    let text = required_s(item, attribute)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| CodecError::InvalidValue {
            attribute,
            message: format!("`{text}` is not an RFC 3339 timestamp: {err}"),
        })
}

fn required_version(item: &Item) -> CodecResult<i64> {
    let value = lookup(item, attr::VERSION)?;
    match value {
        AttributeValue::N(text) => value.as_i64().ok_or_else(|| CodecError::InvalidValue {
            attribute: attr::VERSION,
            message: format!("`{text}` is not an integer"),
        }),
        other => Err(wrong_type(attr::VERSION, "N", other)),
    }
}

/// Explicit optional lookup: absent and `NULL` both mean "not set".
fn optional<'a>(item: &'a Item, attribute: &'static str) -> Option<&'a AttributeValue> {
    item.get(attribute).filter(|value| !value.is_null())
}

fn optional_s(item: &Item, attribute: &'static str) -> CodecResult<Option<String>> {
    optional(item, attribute)
        .map(|value| {
            value
                .as_s()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(attribute, "S", value))
        })
        .transpose()
}

fn optional_ss(item: &Item, attribute: &'static str) -> CodecResult<Option<Vec<String>>> {
    optional(item, attribute)
        .map(|value| {
            value
                .as_ss()
                .map(<[String]>::to_vec)
                .ok_or_else(|| wrong_type(attribute, "SS", value))
        })
        .transpose()
}

fn optional_bool(item: &Item, attribute: &'static str) -> CodecResult<Option<bool>> {
    optional(item, attribute)
        .map(|value| {
            value
                .as_bool()
                .ok_or_else(|| wrong_type(attribute, "BOOL", value))
        })
        .transpose()
}
