//! Gateway request handlers for agreement CRUD.
//!
//! # Responsibility
//! - Translate parsed gateway events into `AgreementStore` calls.
//! - Map store outcomes to status-coded response envelopes.
//!
//! # Invariants
//! - Handlers never panic and never retry; every outcome is an envelope.
//! - Caller errors are answered before the store is invoked when they can
//!   be detected from the envelope alone.

use crate::envelope::{
    find_value, parse_event, path_parameter, ErrorMessage, GatewayResponse, SC_BAD_REQUEST,
    SC_CONFLICT, SC_CREATED, SC_INTERNAL_SERVER_ERROR, SC_NOT_FOUND, SC_OK, XREF_PATH_PARAMETER,
};
use agreement_core::{Agreement, AgreementRequest, AgreementStore, StoreError, StoreResult, Table};
use log::info;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const REQUIRE_CREATOR_XREF: &str = "Require creatorXref to create an agreement";

/// Handler entry points, one per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Get,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "get" => Ok(Self::Get),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!(
                "unsupported operation `{other}`; expected create|get|update|delete"
            )),
        }
    }
}

/// Status code for each store error kind.
pub fn status_for(err: &StoreError) -> u16 {
    match err {
        StoreError::Validation(_) | StoreError::TableMissing(_) => SC_BAD_REQUEST,
        StoreError::NotFound(_) => SC_NOT_FOUND,
        StoreError::Conflict { .. } => SC_CONFLICT,
        StoreError::CreationFailed { .. }
        | StoreError::Inconsistent(_)
        | StoreError::Codec(_)
        | StoreError::Table(_) => SC_INTERNAL_SERVER_ERROR,
    }
}

/// Stateless request handlers over one agreement store.
pub struct AgreementHandlers<T: Table> {
    store: AgreementStore<T>,
}

impl<T: Table> AgreementHandlers<T> {
    pub fn new(store: AgreementStore<T>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &AgreementStore<T> {
        &self.store
    }

    /// Routes a raw event to the handler for `operation`.
    pub fn handle(&self, operation: Operation, raw_event: &str) -> GatewayResponse {
        let response = match operation {
            Operation::Create => self.create(raw_event),
            Operation::Get => self.get(raw_event),
            Operation::Update => self.update(raw_event),
            Operation::Delete => self.delete(raw_event),
        };
        info!(
            "event=handler_response module=api operation={} status_code={}",
            operation, response.status_code
        );
        response
    }

    /// `201` with the created agreement.
    pub fn create(&self, raw_event: &str) -> GatewayResponse {
        let request = match parse_event(raw_event).and_then(|event| request_body(&event)) {
            Ok(request) => request,
            Err(response) => return response,
        };
        if request
            .creator_xref
            .as_deref()
            .map_or(true, |creator| creator.trim().is_empty())
        {
            return GatewayResponse::error(REQUIRE_CREATOR_XREF, SC_BAD_REQUEST);
        }
        respond(self.store.create(&request), SC_CREATED)
    }

    /// `200` with the stored agreement.
    pub fn get(&self, raw_event: &str) -> GatewayResponse {
        let xref = match parse_event(raw_event).and_then(|event| path_xref(&event)) {
            Ok(xref) => xref,
            Err(response) => return response,
        };
        respond(self.store.get(&xref), SC_OK)
    }

    /// `200` with the post-update agreement. The path reference wins over
    /// any `xref` in the body.
    pub fn update(&self, raw_event: &str) -> GatewayResponse {
        let event = match parse_event(raw_event) {
            Ok(event) => event,
            Err(response) => return response,
        };
        let parts = path_xref(&event).and_then(|xref| Ok((xref, request_body(&event)?)));
        let (xref, mut request) = match parts {
            Ok(parts) => parts,
            Err(response) => return response,
        };
        request.xref = Some(xref);
        respond(self.store.update(&request), SC_OK)
    }

    /// `200` with the deleted agreement.
    pub fn delete(&self, raw_event: &str) -> GatewayResponse {
        let xref = match parse_event(raw_event).and_then(|event| path_xref(&event)) {
            Ok(xref) => xref,
            Err(response) => return response,
        };
        respond(self.store.delete(&xref), SC_OK)
    }
}

fn respond(result: StoreResult<Agreement>, success_status: u16) -> GatewayResponse {
    match result {
        Ok(agreement) => GatewayResponse::json(&agreement, success_status),
        Err(err) => GatewayResponse::error(err.to_string(), status_for(&err)),
    }
}

fn path_xref(event: &Value) -> Result<String, GatewayResponse> {
    path_parameter(event, XREF_PATH_PARAMETER).ok_or_else(|| {
        GatewayResponse::json(
            &ErrorMessage::new(format!("{XREF_PATH_PARAMETER} was not set"), SC_NOT_FOUND),
            SC_BAD_REQUEST,
        )
    })
}

fn request_body(event: &Value) -> Result<AgreementRequest, GatewayResponse> {
    let body = match find_value(event, "body") {
        None | Some(Value::Null) => {
            return Err(GatewayResponse::error("Body was null", SC_BAD_REQUEST))
        }
        Some(body) => body,
    };
    let request: Option<AgreementRequest> = match body {
        Value::String(text) => {
            serde_json::from_str(text).map_err(GatewayResponse::invalid_json)?
        }
        other => serde_json::from_value(other.clone()).map_err(GatewayResponse::invalid_json)?,
    };
    request.ok_or_else(|| GatewayResponse::error("Request was null", SC_BAD_REQUEST))
}

#[cfg(test)]
mod tests {
    use super::{status_for, Operation};
    use agreement_core::{ConflictKind, StoreError, ValidationError};

    #[test]
    fn operation_parses_case_insensitively() {
        assert_eq!(" Update ".parse::<Operation>().unwrap(), Operation::Update);
        assert!("list".parse::<Operation>().is_err());
    }

    #[test]
    fn status_mapping_covers_every_error_kind() {
        let cases = [
            (StoreError::Validation(ValidationError::EmptyXref), 400),
            (StoreError::NotFound("x".to_string()), 404),
            (
                StoreError::Conflict {
                    kind: ConflictKind::Delete,
                    xref: "x".to_string(),
                },
                409,
            ),
            (StoreError::TableMissing("agreement".to_string()), 400),
            (StoreError::CreationFailed { attempts: 3 }, 500),
            (StoreError::Inconsistent("boom".to_string()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err}");
        }
    }
}
