//! Request-handler surface for the agreement store.
//!
//! # Responsibility
//! - Parse gateway events and shape status-coded response envelopes.
//! - Expose process-level entry points that bind configuration once.

pub mod api;
pub mod envelope;
pub mod handler;

pub use envelope::{ErrorMessage, GatewayResponse, XREF_PATH_PARAMETER};
pub use handler::{status_for, AgreementHandlers, Operation};
