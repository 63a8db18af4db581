//! Domain and storage models.
//!
//! # Responsibility
//! - Define the agreement snapshot and request shapes used by callers.
//! - Define the typed item representation persisted in tables.
//!
//! # Invariants
//! - Every agreement is identified by a stable external reference (`xref`).
//! - Domain snapshots are immutable once returned; only store writes change
//!   persisted state.

pub mod agreement;
pub mod item;
