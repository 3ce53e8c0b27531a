//! Registry provisioning.
//!
//! # Responsibility
//! - Fix the registry owner and admin policy once per store.
//! - Offer the single-organization deployment shape as one atomic step.
//!
//! # Invariants
//! - The provisioning record is written at most once and never changes.
//! - Repeating provisioning with identical inputs is a no-op.

use crate::clock::Clock;
use crate::error::{RegistryError, RegistryResult};
use crate::model::directory::{AdminPolicy, RegistryMeta};
use crate::model::identity::Identity;
use crate::repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
use crate::service::registry_service::{in_write_tx, register_org_in};
use rusqlite::Connection;

/// Records `owner` and `admin_policy` for a fresh store.
///
/// # Errors
/// - `ProvisionConflict` when the store already has a different owner or
///   policy.
pub fn provision_registry(
    conn: &Connection,
    owner: &Identity,
    admin_policy: AdminPolicy,
    clock: &impl Clock,
) -> RegistryResult<RegistryMeta> {
    let context = format!("owner={owner} admin_policy={}", admin_policy.as_str());
    in_write_tx(conn, "provision_registry", &context, |tx| {
        let directory = SqliteDirectoryRepository::new(tx);
        ensure_meta(&directory, owner, admin_policy, clock)
    })
}

/// Provisions a registry that serves exactly one organization.
///
/// The owner registers `org` in the same transaction. Re-running with the
/// same inputs leaves the store untouched.
pub fn provision_single_org(
    conn: &Connection,
    owner: &Identity,
    org: &Identity,
    clock: &impl Clock,
) -> RegistryResult<RegistryMeta> {
    let context = format!("owner={owner} org={org}");
    in_write_tx(conn, "provision_single_org", &context, |tx| {
        let directory = SqliteDirectoryRepository::new(tx);
        let meta = ensure_meta(&directory, owner, AdminPolicy::Exclusive, clock)?;
        if !directory.org_exists(org)? {
            register_org_in(&directory, &meta, owner, org, clock.now_ms())?;
        }
        Ok(meta)
    })
}

fn ensure_meta(
    directory: &impl DirectoryRepository,
    owner: &Identity,
    admin_policy: AdminPolicy,
    clock: &impl Clock,
) -> RegistryResult<RegistryMeta> {
    if let Some(existing) = directory.load_meta()? {
        if existing.owner == *owner && existing.admin_policy == admin_policy {
            return Ok(existing);
        }
        return Err(RegistryError::ProvisionConflict {
            owner: existing.owner,
            admin_policy: existing.admin_policy,
        });
    }

    let meta = RegistryMeta {
        owner: owner.clone(),
        admin_policy,
        provisioned_at: clock.now_ms(),
    };
    directory.insert_meta(&meta)?;
    Ok(meta)
}
