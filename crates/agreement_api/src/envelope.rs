//! Gateway event parsing and response envelopes.
//!
//! # Responsibility
//! - Parse raw gateway events into JSON trees and locate request parts.
//! - Build status-coded JSON response envelopes.
//!
//! # Invariants
//! - Building a response never panics; serialization failures degrade to a
//!   500 envelope with a fixed body.
//! - Every response carries `Content-Type: application/json`.

use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const SC_OK: u16 = 200;
pub const SC_CREATED: u16 = 201;
pub const SC_BAD_REQUEST: u16 = 400;
pub const SC_NOT_FOUND: u16 = 404;
pub const SC_CONFLICT: u16 = 409;
pub const SC_INTERNAL_SERVER_ERROR: u16 = 500;

/// Path parameter carrying the agreement external reference.
pub const XREF_PATH_PARAMETER: &str = "agreementXref";

const FALLBACK_ERROR_BODY: &str =
    r#"{"message":"Failed to serialize response body","statusCode":500}"#;

/// Error body returned for every non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub message: String,
    pub status_code: u16,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }
}

/// Response envelope handed back to the gateway.
///
/// `body` is itself a JSON document serialized to a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub status_code: u16,
}

impl GatewayResponse {
    /// Serializes `payload` as the body with the given status.
    pub fn json<T: Serialize>(payload: &T, status_code: u16) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self::with_body(body, status_code),
            Err(err) => {
                error!(
                    "event=response_serialize module=api status=error error={}",
                    err
                );
                Self::with_body(FALLBACK_ERROR_BODY.to_string(), SC_INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Error envelope whose body status matches the HTTP status.
    pub fn error(message: impl Into<String>, status_code: u16) -> Self {
        Self::json(&ErrorMessage::new(message, status_code), status_code)
    }

    /// `400 Invalid JSON in body: <details>`.
    pub fn invalid_json(details: impl std::fmt::Display) -> Self {
        Self::error(format!("Invalid JSON in body: {details}"), SC_BAD_REQUEST)
    }

    /// Decodes the body as an error message, if it is one.
    pub fn error_message(&self) -> Option<ErrorMessage> {
        serde_json::from_str(&self.body).ok()
    }

    /// Serializes the whole envelope.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"body":{},"headers":{{"Content-Type":"application/json"}},"statusCode":500}}"#,
                Value::String(FALLBACK_ERROR_BODY.to_string())
            )
        })
    }

    fn with_body(body: String, status_code: u16) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            body,
            headers,
            status_code,
        }
    }
}

/// Parses a raw event.
///
/// Returns the error envelope to send back when the event is not JSON or is
/// JSON `null`.
pub fn parse_event(raw: &str) -> Result<Value, GatewayResponse> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) => Err(GatewayResponse::invalid_json("event was null")),
        Ok(event) => Ok(event),
        Err(err) => Err(GatewayResponse::invalid_json(err)),
    }
}

/// Depth-first search for the first object member named `key`.
pub fn find_value<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    match tree {
        Value::Object(members) => members
            .get(key)
            .or_else(|| members.values().find_map(|value| find_value(value, key))),
        Value::Array(elements) => elements.iter().find_map(|value| find_value(value, key)),
        _ => None,
    }
}

/// Reads `pathParameters.<name>` as text; numbers are rendered as text.
pub fn path_parameter(event: &Value, name: &str) -> Option<String> {
    let text = match find_value(event, "pathParameters")?.get(name)? {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    Some(text).filter(|text| !text.is_empty())
}
