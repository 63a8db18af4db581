//! Process-level entry points over the agreement handlers.
//!
//! # Responsibility
//! - Open the table service for a caller-supplied configuration, bind the
//!   table and dispatch one raw event.
//!
//! # Invariants
//! - Exported functions never panic.
//! - Return values are serialized response envelopes (or empty strings for
//!   successful setup calls).

use crate::envelope::{GatewayResponse, SC_BAD_REQUEST, SC_INTERNAL_SERVER_ERROR};
use crate::handler::{status_for, AgreementHandlers, Operation};
use agreement_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, AgreementStore,
    StoreConfig, StoreError,
};
use log::error;

/// Expose core crate version.
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// Returns an empty string on success and the error message on failure.
pub fn init_logging(level: &str, log_dir: &str) -> String {
    match init_logging_inner(level, log_dir) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Handles one raw event against `config`.
///
/// `operation` is one of `create|get|update|delete`.
pub fn handle_event(
    config: &StoreConfig,
    operation: &str,
    raw_event: &str,
) -> GatewayResponse {
    let operation = match operation.parse::<Operation>() {
        Ok(operation) => operation,
        Err(message) => return GatewayResponse::error(message, SC_BAD_REQUEST),
    };
    let conn = match config.open_connection() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=handler_setup module=api status=error db_path={} error={}",
                config.db_path.display(),
                err
            );
            return GatewayResponse::error(
                format!("table service unavailable: {err}"),
                SC_INTERNAL_SERVER_ERROR,
            );
        }
    };
    let table = match config.bind_table(&conn) {
        Ok(table) => table,
        Err(err) => {
            let err = StoreError::from(err);
            return GatewayResponse::error(err.to_string(), status_for(&err));
        }
    };
    AgreementHandlers::new(AgreementStore::new(table)).handle(operation, raw_event)
}
