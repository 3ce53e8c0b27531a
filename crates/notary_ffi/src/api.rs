//! FFI registry API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose registry use cases to Dart via FRB.
//! - Translate registry errors into stable codes plus user-facing messages.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every failure carries a distinct `error_code` from the core registry.
//! - Digests cross the boundary as hex strings; document content never does.
//!
//! # See also
//! - `notary_core::logging`

use log::warn;
use notary_core::db::open_db;
use notary_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    provision_registry, AdminChange, AdminPolicy, ContentDigest, DocumentBinding, DocumentId,
    Identity, ModelValidationError, RegistryError, RegistryResult, RegistryService, SystemClock,
};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::OnceLock;

const REGISTRY_DB_FILE_NAME: &str = "notary_registry.sqlite3";
static REGISTRY_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Generic action response envelope for directory mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Stable failure code (`not_owner`, `unauthorized`, ...).
    pub error_code: Option<String>,
    /// Human-readable response message for UI.
    pub message: String,
}

impl RegistryActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            error_code: None,
            message: message.into(),
        }
    }

    fn failure(err: &RegistryError) -> Self {
        Self {
            ok: false,
            error_code: Some(err.code().to_string()),
            message: user_message(err),
        }
    }
}

/// Binding view returned by notarization and lookup calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReceipt {
    pub document_id: String,
    pub org: String,
    /// Lowercase hex digest without `0x` prefix.
    pub digest_hex: String,
    /// Epoch milliseconds of the binding.
    pub timestamp: i64,
    pub receipt_id: String,
}

/// Response envelope for document notarization and lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentResponse {
    pub ok: bool,
    pub error_code: Option<String>,
    pub message: String,
    /// Present on success; `None` for a lookup of an unknown id.
    pub receipt: Option<DocumentReceipt>,
}

impl DocumentResponse {
    fn failure(err: &RegistryError) -> Self {
        Self {
            ok: false,
            error_code: Some(err.code().to_string()),
            message: user_message(err),
            receipt: None,
        }
    }
}

/// Response envelope for content verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResponse {
    pub ok: bool,
    pub error_code: Option<String>,
    pub message: String,
    pub verified: bool,
    /// Most recent binding time for the digest.
    pub timestamp: Option<i64>,
}

/// Provisions the registry owner and admin policy (`exclusive|shared`).
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Idempotent for identical inputs.
#[flutter_rust_bridge::frb(sync)]
pub fn registry_provision(owner: String, admin_policy: String) -> RegistryActionResponse {
    let result = AdminPolicy::parse(&admin_policy)
        .ok_or_else(|| {
            RegistryError::from(ModelValidationError::UnknownAdminPolicy(admin_policy.clone()))
        })
        .and_then(|policy| {
            let owner = Identity::parse(&owner)?;
            with_connection(|conn| provision_registry(conn, &owner, policy, &SystemClock))
        });
    match result {
        Ok(_) => RegistryActionResponse::success("Registry provisioned."),
        Err(err) => RegistryActionResponse::failure(&err),
    }
}

/// Registers an organization; only the registry owner may call this.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn registry_register_org(caller: String, org: String) -> RegistryActionResponse {
    let result = parse_identities([caller.as_str(), org.as_str()]).and_then(|[caller, org]| {
        with_registry(|service| service.register_org(&caller, &org))
    });
    match result {
        Ok(()) => RegistryActionResponse::success("Organization registered."),
        Err(err) => RegistryActionResponse::failure(&err),
    }
}

/// Adds `new_admin` to `org`; the caller must administer `org`.
#[flutter_rust_bridge::frb(sync)]
pub fn registry_add_org_admin(
    caller: String,
    org: String,
    new_admin: String,
) -> RegistryActionResponse {
    let result = parse_identities([caller.as_str(), org.as_str(), new_admin.as_str()])
        .and_then(|[caller, org, new_admin]| {
            with_registry(|service| service.add_org_admin(&caller, &org, &new_admin))
        });
    match result {
        Ok(AdminChange::Added) => RegistryActionResponse::success("Admin added."),
        Ok(AdminChange::AlreadyMember) => {
            RegistryActionResponse::success("Identity is already an admin.")
        }
        Err(err) => RegistryActionResponse::failure(&err),
    }
}

/// Notarizes `digest_hex` under `document_id` for the caller's organization.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - `digest_hex` accepts an optional `0x` prefix.
/// - Returns the binding receipt on success.
#[flutter_rust_bridge::frb(sync)]
pub fn registry_store_document_hash(
    caller: String,
    document_id: String,
    digest_hex: String,
) -> DocumentResponse {
    match store_document_hash_inner(&caller, document_id, &digest_hex) {
        Ok(binding) => DocumentResponse {
            ok: true,
            error_code: None,
            message: "Document notarized.".to_string(),
            receipt: Some(to_receipt(binding)),
        },
        Err(err) => DocumentResponse::failure(&err),
    }
}

/// Looks up the binding for `document_id`.
///
/// An unknown id is a successful call with `receipt = None`.
#[flutter_rust_bridge::frb(sync)]
pub fn registry_get_document(document_id: String) -> DocumentResponse {
    let result = DocumentId::parse(document_id)
        .map_err(RegistryError::from)
        .and_then(|id| with_registry(|service| service.get_binding(&id)));
    match result {
        Ok(Some(binding)) => DocumentResponse {
            ok: true,
            error_code: None,
            message: "Document found.".to_string(),
            receipt: Some(to_receipt(binding)),
        },
        Ok(None) => DocumentResponse {
            ok: true,
            error_code: None,
            message: "Document not notarized.".to_string(),
            receipt: None,
        },
        Err(err) => DocumentResponse::failure(&err),
    }
}

/// Checks whether `digest_hex` was ever notarized under any id.
#[flutter_rust_bridge::frb(sync)]
pub fn registry_verify_content(digest_hex: String) -> VerifyResponse {
    let result = ContentDigest::from_hex(&digest_hex)
        .map_err(RegistryError::from)
        .and_then(|digest| with_registry(|service| service.verify_content(&digest)));
    match result {
        Ok(verification) => VerifyResponse {
            ok: true,
            error_code: None,
            message: if verification.verified {
                "Content verified.".to_string()
            } else {
                "Content not found.".to_string()
            },
            verified: verification.verified,
            timestamp: verification.timestamp,
        },
        Err(err) => VerifyResponse {
            ok: false,
            error_code: Some(err.code().to_string()),
            message: user_message(&err),
            verified: false,
            timestamp: None,
        },
    }
}

fn store_document_hash_inner(
    caller: &str,
    document_id: String,
    digest_hex: &str,
) -> RegistryResult<DocumentBinding> {
    let caller = Identity::parse(caller)?;
    let id = DocumentId::parse(document_id)?;
    let digest = ContentDigest::from_hex(digest_hex)?;
    with_registry(|service| service.store_document_hash(&caller, &id, &digest))
}

/// Maps a registry error to the message shown to end users.
fn user_message(err: &RegistryError) -> String {
    match err {
        RegistryError::NotOwner { .. } => {
            "Only the registry owner can register organizations.".to_string()
        }
        RegistryError::DuplicateOrg(org) => format!("Organization {org} is already registered."),
        RegistryError::UnknownOrg(org) => format!("Organization {org} is not registered."),
        RegistryError::Unauthorized {
            document_id: Some(id),
            ..
        } => format!("You are not authorized to notarize document {id}."),
        RegistryError::Unauthorized { .. } => {
            "You are not an admin of this organization.".to_string()
        }
        RegistryError::AlreadyNotarized(id) => {
            format!("Document {id} is already notarized with this content.")
        }
        RegistryError::ImmutableViolation(id) => {
            format!("Document {id} is already notarized with different content and cannot change.")
        }
        RegistryError::AdminAlreadyAssigned { admin, org } => {
            format!("{admin} already administers organization {org}.")
        }
        RegistryError::NotProvisioned => "The registry has not been set up yet.".to_string(),
        RegistryError::ProvisionConflict { .. } => {
            "The registry is already set up with a different owner or policy.".to_string()
        }
        RegistryError::Validation(inner) => format!("Invalid input: {inner}."),
        RegistryError::Db(_) | RegistryError::InvalidData(_) => {
            warn!(
                "event=ffi_registry_failure module=ffi status=error error_code={} error={err}",
                err.code()
            );
            "The registry store is unavailable. Please try again.".to_string()
        }
    }
}

fn parse_identities<const N: usize>(values: [&str; N]) -> RegistryResult<[Identity; N]> {
    let mut parsed = Vec::with_capacity(N);
    for value in values {
        parsed.push(Identity::parse(value)?);
    }
    parsed
        .try_into()
        .map_err(|_| RegistryError::InvalidData("identity count mismatch".to_string()))
}

fn to_receipt(binding: DocumentBinding) -> DocumentReceipt {
    DocumentReceipt {
        document_id: binding.id.as_str().to_string(),
        org: binding.org.as_str().to_string(),
        digest_hex: binding.digest.to_hex(),
        timestamp: binding.notarized_at,
        receipt_id: binding.receipt_id.to_string(),
    }
}

fn resolve_registry_db_path() -> PathBuf {
    REGISTRY_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(notary_core::config::ENV_DB_PATH) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(REGISTRY_DB_FILE_NAME)
        })
        .clone()
}

fn with_connection<T>(
    f: impl FnOnce(&Connection) -> RegistryResult<T>,
) -> RegistryResult<T> {
    let conn = open_db(resolve_registry_db_path())?;
    f(&conn)
}

fn with_registry<T>(f: impl FnOnce(&RegistryService<'_>) -> RegistryResult<T>) -> RegistryResult<T> {
    with_connection(|conn| f(&RegistryService::new(conn)))
}
