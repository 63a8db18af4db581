//! Item codec between stored items and agreement snapshots.
//!
//! # Responsibility
//! - Own the storage shape of an agreement (attribute names and types).
//! - Keep request validation next to the item builders that need it.
//!
//! # Invariants
//! - Decoding never panics on malformed items; it returns `CodecError`.
//! - Builders fail with a caller error before producing partial items.

pub mod agreement_codec;
