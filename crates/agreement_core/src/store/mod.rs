//! Entity store layer.
//!
//! # Responsibility
//! - Translate agreement use cases into conditional table writes.
//! - Classify table outcomes into the store error taxonomy.
//!
//! # See also
//! - `crate::db::table` for the conditional-write contract.

pub mod agreement_store;
