//! Registry failure taxonomy.
//!
//! # Responsibility
//! - Give every rejection of a registry call its own variant and stable code.
//! - Separate permanent domain rejections from storage transport failures.
//!
//! # Invariants
//! - Domain variants are never merged: a duplicate submission is always
//!   `AlreadyNotarized`, a changed digest is always `ImmutableViolation`, and a
//!   cross-organization claim is always `Unauthorized`.
//! - No variant is retried inside the core.

use crate::db::DbError;
use crate::model::directory::AdminPolicy;
use crate::model::identity::{DocumentId, Identity, ModelValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Error returned by registry operations.
#[derive(Debug)]
pub enum RegistryError {
    /// Caller is not the registry owner.
    NotOwner { caller: Identity },
    /// Organization is already registered.
    DuplicateOrg(Identity),
    /// Organization is not registered.
    UnknownOrg(Identity),
    /// Caller is not an admin, or administers a different organization than
    /// the one owning the document id.
    Unauthorized {
        caller: Identity,
        document_id: Option<DocumentId>,
    },
    /// The exact id + digest pair is already recorded.
    AlreadyNotarized(DocumentId),
    /// The id is already bound to a different digest.
    ImmutableViolation(DocumentId),
    /// Exclusive policy: identity already administers another organization.
    AdminAlreadyAssigned { admin: Identity, org: Identity },
    /// Store has no owner yet.
    NotProvisioned,
    /// Store was provisioned with a different owner or admin policy.
    ProvisionConflict {
        owner: Identity,
        admin_policy: AdminPolicy,
    },
    /// Boundary input failed validation.
    Validation(ModelValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Persisted row cannot be decoded into the read model.
    InvalidData(String),
}

impl RegistryError {
    /// Stable machine-readable code for boundary layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotOwner { .. } => "not_owner",
            Self::DuplicateOrg(_) => "duplicate_org",
            Self::UnknownOrg(_) => "unknown_org",
            Self::Unauthorized { .. } => "unauthorized",
            Self::AlreadyNotarized(_) => "already_notarized",
            Self::ImmutableViolation(_) => "immutable_violation",
            Self::AdminAlreadyAssigned { .. } => "admin_already_assigned",
            Self::NotProvisioned => "not_provisioned",
            Self::ProvisionConflict { .. } => "provision_conflict",
            Self::Validation(_) => "invalid_input",
            Self::Db(_) => "storage_error",
            Self::InvalidData(_) => "invalid_data",
        }
    }

    /// Whether this is a domain rejection rather than a storage failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Db(_) | Self::InvalidData(_))
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOwner { caller } => {
                write!(f, "caller `{caller}` is not the registry owner")
            }
            Self::DuplicateOrg(org) => write!(f, "organization already registered: {org}"),
            Self::UnknownOrg(org) => write!(f, "organization not registered: {org}"),
            Self::Unauthorized {
                caller,
                document_id: Some(id),
            } => write!(f, "caller `{caller}` is not authorized for document `{id}`"),
            Self::Unauthorized {
                caller,
                document_id: None,
            } => write!(f, "caller `{caller}` is not authorized"),
            Self::AlreadyNotarized(id) => write!(f, "document already notarized: {id}"),
            Self::ImmutableViolation(id) => {
                write!(f, "document `{id}` is already bound to a different digest")
            }
            Self::AdminAlreadyAssigned { admin, org } => {
                write!(f, "admin `{admin}` already administers organization `{org}`")
            }
            Self::NotProvisioned => write!(f, "registry has not been provisioned"),
            Self::ProvisionConflict {
                owner,
                admin_policy,
            } => write!(
                f,
                "registry already provisioned for owner `{owner}` with {} admin policy",
                admin_policy.as_str()
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid registry data: {message}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RegistryError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RegistryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::RegistryError;
    use crate::db::DbError;
    use crate::model::identity::{DocumentId, Identity};
    use std::collections::HashSet;

    fn identity(value: &str) -> Identity {
        Identity::parse(value).expect("valid identity")
    }

    #[test]
    fn domain_rejections_have_distinct_codes() {
        let id = DocumentId::parse("doc-1").expect("valid id");
        let errors = [
            RegistryError::NotOwner {
                caller: identity("eve"),
            },
            RegistryError::DuplicateOrg(identity("org-a")),
            RegistryError::UnknownOrg(identity("org-z")),
            RegistryError::Unauthorized {
                caller: identity("eve"),
                document_id: Some(id.clone()),
            },
            RegistryError::AlreadyNotarized(id.clone()),
            RegistryError::ImmutableViolation(id),
        ];

        let codes = errors.iter().map(RegistryError::code).collect::<HashSet<_>>();
        assert_eq!(codes.len(), errors.len());
        assert!(errors.iter().all(RegistryError::is_rejection));
    }

    #[test]
    fn storage_errors_are_not_rejections() {
        let err = RegistryError::from(DbError::UnsupportedSchemaVersion {
            db_version: 9,
            latest_supported: 2,
        });
        assert_eq!(err.code(), "storage_error");
        assert!(!err.is_rejection());
    }

    #[test]
    fn unauthorized_message_names_document_when_known() {
        let err = RegistryError::Unauthorized {
            caller: identity("b1"),
            document_id: Some(DocumentId::parse("id1").expect("valid id")),
        };
        assert_eq!(
            err.to_string(),
            "caller `b1` is not authorized for document `id1`"
        );
    }
}
