//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for the admin directory and the ledger.
//! - Isolate SQLite query details from authorization and orchestration.
//!
//! # Invariants
//! - Repositories never decide authorization; they only read and append.
//! - Repositories accept any `Connection`, including an open transaction, so
//!   the service layer owns the commit boundary.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod directory_repo;
pub mod ledger_repo;

use crate::error::{RegistryError, RegistryResult};
use crate::model::identity::Identity;

pub(crate) fn parse_stored_identity(value: &str, column: &str) -> RegistryResult<Identity> {
    Identity::parse(value).map_err(|_| {
        RegistryError::InvalidData(format!("invalid identity `{value}` in {column}"))
    })
}
