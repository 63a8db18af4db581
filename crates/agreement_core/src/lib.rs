//! Agreement data-access core.
//! Single source of truth for agreement invariants: identity, version
//! monotonicity and conditional-write semantics.

pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod store;

pub use codec::agreement_codec::{CodecError, CodecResult};
pub use config::StoreConfig;
pub use db::{
    provision_table, Condition, SqliteTable, Table, TableError, TableResult, UpdateExpression,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::agreement::{Agreement, AgreementRequest, ValidationError};
pub use model::item::{AttributeValue, Item};
pub use store::agreement_store::{
    AgreementStore, ConflictKind, StoreError, StoreResult, MAX_CREATE_ATTEMPTS,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
