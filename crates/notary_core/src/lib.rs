//! Core registry for document notarization.
//! This crate is the single source of truth for directory and ledger
//! invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod guard;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, RegistryConfig};
pub use error::{RegistryError, RegistryResult};
pub use events::{EventEmitter, LogObserver, NotarizationObserver};
pub use guard::{authorize_for_id, authorize_for_org, Authorization};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LoggingOptions,
};
pub use model::binding::{
    DocumentBinding, DocumentNotarized, NotarizationPoint, OrgStats, Verification,
};
pub use model::directory::{AdminPolicy, OrgAdmin, RegistryMeta};
pub use model::identity::{ContentDigest, DocumentId, Identity, ModelValidationError};
pub use model::Timestamp;
pub use repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
pub use repo::ledger_repo::{LedgerListQuery, LedgerRepository, SqliteLedgerRepository};
pub use service::provision::{provision_registry, provision_single_org};
pub use service::registry_service::{AdminChange, RegistryService};

/// Minimal health-check API for boundary integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
