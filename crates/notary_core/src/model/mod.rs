//! Domain model for the notary registry.
//!
//! # Responsibility
//! - Define validated value types for identities, document ids and digests.
//! - Define read models for bindings, events and directory metadata.
//!
//! # Invariants
//! - Value types can only be constructed through validating parsers.
//! - A `DocumentBinding` is never mutated after it is read from storage.
//!
//! # See also
//! - `crate::guard` for the authorization rules.

pub mod binding;
pub mod directory;
pub mod identity;

/// Unix epoch milliseconds.
///
/// Every committed binding carries a strictly positive value.
pub type Timestamp = i64;
