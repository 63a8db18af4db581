//! Agreement domain model.
//!
//! # Responsibility
//! - Define the canonical agreement snapshot returned to callers.
//! - Define the caller-supplied request shape for create/update.
//!
//! # Invariants
//! - `xref` is assigned once at creation and never changes.
//! - `version` starts at 1 and grows by exactly 1 per accepted update.
//! - `commissioner_xref` falls back to `creator_xref` at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Immutable snapshot of one stored agreement.
///
/// Serialized with camelCase names to match the wire schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    /// External reference. Caller-visible identity.
    pub xref: String,
    /// Owner of the agreement.
    pub creator_xref: String,
    /// Everyone involved. Order carries no meaning.
    pub participants: Vec<String>,
    /// Moderator; the creator when none was supplied.
    pub commissioner_xref: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    /// Condition statement evaluated at `conditions_deadline`.
    pub conditions: String,
    /// Consequence statement due by `punishment_deadline`.
    pub punishment: String,
    pub conditions_deadline: DateTime<Utc>,
    pub punishment_deadline: DateTime<Utc>,
    /// Set after resolution (a link, a posting, ...).
    pub result_xref: Option<String>,
    pub comments: Option<Vec<String>>,
    pub is_complete: Option<bool>,
    pub version: i64,
}

/// Caller-supplied agreement fields for create and update.
///
/// Every field is optional at the type level; mandatory-field checks happen
/// in the codec so that each missing field gets its own error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgreementRequest {
    pub xref: Option<String>,
    pub creator_xref: Option<String>,
    pub participants: Option<Vec<String>>,
    pub commissioner_xref: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub conditions: Option<String>,
    pub punishment: Option<String>,
    pub conditions_deadline: Option<DateTime<Utc>>,
    pub punishment_deadline: Option<DateTime<Utc>>,
    pub result_xref: Option<String>,
    pub comments: Option<Vec<String>>,
    pub is_complete: Option<bool>,
    /// Version the caller last observed. Required by update.
    pub version: Option<i64>,
}

/// Caller error detected before any storage I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A mandatory field was absent or blank. Carries the wire field name.
    MissingField(&'static str),
    /// The creator reference was absent or empty.
    EmptyId,
    /// The external reference was absent or empty.
    EmptyXref,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "{field} must be defined"),
            Self::EmptyId => write!(f, "id was null or empty"),
            Self::EmptyXref => write!(f, "xref was null or empty"),
        }
    }
}

impl Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::{AgreementRequest, ValidationError};

    #[test]
    fn request_accepts_camel_case_and_ignores_unknown_fields() {
        let request: AgreementRequest = serde_json::from_str(
            r#"{
                "creatorXref": "alice",
                "conditionsDeadline": "2030-01-01T00:00:00Z",
                "createdAt": "ignored",
                "isComplete": true,
                "version": 4
            }"#,
        )
        .expect("request should deserialize");

        assert_eq!(request.creator_xref.as_deref(), Some("alice"));
        assert!(request.conditions_deadline.is_some());
        assert_eq!(request.is_complete, Some(true));
        assert_eq!(request.version, Some(4));
        assert_eq!(request.title, None);
    }

    #[test]
    fn validation_messages_name_the_field() {
        assert_eq!(
            ValidationError::MissingField("punishmentDeadline").to_string(),
            "punishmentDeadline must be defined"
        );
        assert_eq!(ValidationError::EmptyId.to_string(), "id was null or empty");
    }
}
