//! Registry use-case service.
//!
//! # Responsibility
//! - Provide `register_org`, `add_org_admin` and `store_document_hash` as
//!   atomic units, plus the public read queries.
//! - Notify observers after a binding commits.
//!
//! # Invariants
//! - Every mutating call runs inside one `BEGIN IMMEDIATE` transaction that
//!   covers the whole read-validate-write body. Any failure drops the
//!   transaction, which rolls back every staged write.
//! - Validation always completes before the first write.
//! - Reads need no provisioning record and no write lock.
//!
//! # See also
//! - `crate::guard` for the authorization rules.

use crate::clock::{Clock, SystemClock};
use crate::error::{RegistryError, RegistryResult};
use crate::events::{EventEmitter, NotarizationObserver};
use crate::guard::{authorize_for_id, authorize_for_org};
use crate::model::binding::{DocumentBinding, OrgStats, Verification};
use crate::model::directory::{AdminPolicy, OrgAdmin, RegistryMeta};
use crate::model::identity::{ContentDigest, DocumentId, Identity};
use crate::model::Timestamp;
use crate::repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
use crate::repo::ledger_repo::{LedgerListQuery, LedgerRepository, SqliteLedgerRepository};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Outcome of a successful `add_org_admin` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminChange {
    /// Identity joined the organization's admin set.
    Added,
    /// Identity was already an admin; nothing was written.
    AlreadyMember,
}

/// Registry facade over one migrated connection.
pub struct RegistryService<'conn, C: Clock = SystemClock> {
    conn: &'conn Connection,
    clock: C,
    emitter: EventEmitter,
}

impl<'conn> RegistryService<'conn, SystemClock> {
    /// Creates a service using wall-clock timestamps and log-only events.
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_clock(conn, SystemClock)
    }
}

impl<'conn, C: Clock> RegistryService<'conn, C> {
    pub fn with_clock(conn: &'conn Connection, clock: C) -> Self {
        Self {
            conn,
            clock,
            emitter: EventEmitter::with_log_observer(),
        }
    }

    /// Replaces the event emitter.
    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn subscribe(&mut self, observer: Arc<dyn NotarizationObserver>) {
        self.emitter.subscribe(observer);
    }

    /// Registers `org` and makes it its own root admin.
    ///
    /// # Errors
    /// - `NotOwner` when `caller` is not the registry owner.
    /// - `DuplicateOrg` when `org` already exists.
    /// - `AdminAlreadyAssigned` under the exclusive policy when `org` already
    ///   administers another organization.
    pub fn register_org(&self, caller: &Identity, org: &Identity) -> RegistryResult<()> {
        let context = format!("caller={caller} org={org}");
        in_write_tx(self.conn, "register_org", &context, |tx| {
            let directory = SqliteDirectoryRepository::new(tx);
            let meta = load_required_meta(&directory)?;
            register_org_in(&directory, &meta, caller, org, self.clock.now_ms())
        })
    }

    /// Adds `new_admin` to `org`'s admin set.
    ///
    /// # Errors
    /// - `UnknownOrg` when `org` is not registered.
    /// - `Unauthorized` when `caller` does not administer `org`.
    /// - `AdminAlreadyAssigned` under the exclusive policy when `new_admin`
    ///   administers another organization.
    ///
    /// Under the shared policy the new admin's home organization moves to
    /// `org`.
    pub fn add_org_admin(
        &self,
        caller: &Identity,
        org: &Identity,
        new_admin: &Identity,
    ) -> RegistryResult<AdminChange> {
        let context = format!("caller={caller} org={org} admin={new_admin}");
        in_write_tx(self.conn, "add_org_admin", &context, |tx| {
            let directory = SqliteDirectoryRepository::new(tx);
            let meta = load_required_meta(&directory)?;
            if !directory.org_exists(org)? {
                return Err(RegistryError::UnknownOrg(org.clone()));
            }
            authorize_for_org(&directory, meta.admin_policy, caller, org)?;

            if directory.is_org_admin(org, new_admin)? {
                return Ok(AdminChange::AlreadyMember);
            }
            if meta.admin_policy == AdminPolicy::Exclusive {
                if let Some(other) = directory.home_org(new_admin)?.filter(|other| other != org) {
                    return Err(RegistryError::AdminAlreadyAssigned {
                        admin: new_admin.clone(),
                        org: other,
                    });
                }
            }

            directory.insert_org_admin(org, new_admin, self.clock.now_ms())?;
            directory.set_home_org(new_admin, org)?;
            Ok(AdminChange::Added)
        })
    }

    /// Binds `id` to the caller's authorized organization and `digest`.
    ///
    /// Observers receive `DocumentNotarized` only after the commit.
    ///
    /// # Errors
    /// - `Unauthorized` when the caller is not an admin, or the id belongs to
    ///   another organization.
    /// - `AlreadyNotarized` when the same id + digest pair exists.
    /// - `ImmutableViolation` when the id is bound to a different digest.
    pub fn store_document_hash(
        &self,
        caller: &Identity,
        id: &DocumentId,
        digest: &ContentDigest,
    ) -> RegistryResult<DocumentBinding> {
        let context = format!("caller={caller} doc_id={id} digest={digest}");
        let binding = in_write_tx(self.conn, "store_document_hash", &context, |tx| {
            let directory = SqliteDirectoryRepository::new(tx);
            let ledger = SqliteLedgerRepository::new(tx);
            let meta = load_required_meta(&directory)?;
            let authorization =
                authorize_for_id(&directory, &ledger, meta.admin_policy, caller, id)?;

            if let Some(existing) = authorization.existing {
                return Err(if existing.digest == *digest {
                    RegistryError::AlreadyNotarized(id.clone())
                } else {
                    RegistryError::ImmutableViolation(id.clone())
                });
            }

            let binding = DocumentBinding {
                id: id.clone(),
                org: authorization.org,
                digest: digest.clone(),
                notarized_at: self.clock.now_ms(),
                receipt_id: Uuid::new_v4(),
            };
            ledger.insert_binding(&binding)?;
            ledger.record_content_timestamp(&binding.digest, binding.notarized_at)?;
            Ok(binding)
        })?;

        self.emitter.emit(&binding.to_event());
        Ok(binding)
    }

    /// Timestamp of the binding for `id`.
    pub fn get_timestamp(&self, id: &DocumentId) -> RegistryResult<Option<Timestamp>> {
        Ok(self.get_binding(id)?.map(|binding| binding.notarized_at))
    }

    /// Organization owning `id`.
    pub fn get_doc_org(&self, id: &DocumentId) -> RegistryResult<Option<Identity>> {
        Ok(self.get_binding(id)?.map(|binding| binding.org))
    }

    /// Timestamp of the most recent binding that used `digest`.
    pub fn get_content_timestamp(
        &self,
        digest: &ContentDigest,
    ) -> RegistryResult<Option<Timestamp>> {
        SqliteLedgerRepository::new(self.conn).content_timestamp(digest)
    }

    /// Full binding for `id`.
    pub fn get_binding(&self, id: &DocumentId) -> RegistryResult<Option<DocumentBinding>> {
        SqliteLedgerRepository::new(self.conn).find_binding(id)
    }

    pub fn verify_content(&self, digest: &ContentDigest) -> RegistryResult<Verification> {
        Ok(Verification::from_timestamp(
            self.get_content_timestamp(digest)?,
        ))
    }

    /// Bindings owned by `org`, newest first.
    pub fn list_documents(
        &self,
        org: &Identity,
        query: &LedgerListQuery,
    ) -> RegistryResult<Vec<DocumentBinding>> {
        self.ensure_org_exists(org)?;
        SqliteLedgerRepository::new(self.conn).list_bindings(org, query)
    }

    /// Notarization count and first/latest binding for `org`.
    pub fn org_stats(&self, org: &Identity) -> RegistryResult<OrgStats> {
        // Deferred read transaction: the three queries share one snapshot.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        if !SqliteDirectoryRepository::new(&tx).org_exists(org)? {
            return Err(RegistryError::UnknownOrg(org.clone()));
        }
        let stats = SqliteLedgerRepository::new(&tx).org_stats(org)?;
        tx.commit()?;
        Ok(stats)
    }

    pub fn list_organizations(&self) -> RegistryResult<Vec<Identity>> {
        SqliteDirectoryRepository::new(self.conn).list_orgs()
    }

    pub fn list_org_admins(&self, org: &Identity) -> RegistryResult<Vec<OrgAdmin>> {
        self.ensure_org_exists(org)?;
        SqliteDirectoryRepository::new(self.conn).list_org_admins(org)
    }

    /// Organization `identity` acts as for unclaimed ids.
    pub fn admin_org(&self, identity: &Identity) -> RegistryResult<Option<Identity>> {
        SqliteDirectoryRepository::new(self.conn).home_org(identity)
    }

    /// Provisioning record, if any.
    pub fn registry_meta(&self) -> RegistryResult<Option<RegistryMeta>> {
        SqliteDirectoryRepository::new(self.conn).load_meta()
    }

    fn ensure_org_exists(&self, org: &Identity) -> RegistryResult<()> {
        if SqliteDirectoryRepository::new(self.conn).org_exists(org)? {
            Ok(())
        } else {
            Err(RegistryError::UnknownOrg(org.clone()))
        }
    }
}

/// Runs `body` inside one immediate write transaction.
///
/// Commits only when `body` succeeds; otherwise the transaction is dropped
/// and rolled back.
pub(crate) fn in_write_tx<T>(
    conn: &Connection,
    op: &'static str,
    context: &str,
    body: impl FnOnce(&Transaction<'_>) -> RegistryResult<T>,
) -> RegistryResult<T> {
    let started_at = Instant::now();
    let outcome = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(RegistryError::from)
        .and_then(|tx| {
            let value = body(&tx)?;
            tx.commit()?;
            Ok(value)
        });

    let duration_ms = started_at.elapsed().as_millis();
    match &outcome {
        Ok(_) => info!(
            "event={op} module=registry status=ok {context} duration_ms={duration_ms}"
        ),
        Err(err) if err.is_rejection() => warn!(
            "event={op} module=registry status=rejected {context} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
        Err(err) => error!(
            "event={op} module=registry status=error {context} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
    }
    outcome
}

pub(crate) fn load_required_meta(
    directory: &impl DirectoryRepository,
) -> RegistryResult<RegistryMeta> {
    directory.load_meta()?.ok_or(RegistryError::NotProvisioned)
}

pub(crate) fn register_org_in(
    directory: &impl DirectoryRepository,
    meta: &RegistryMeta,
    caller: &Identity,
    org: &Identity,
    now: Timestamp,
) -> RegistryResult<()> {
    if *caller != meta.owner {
        return Err(RegistryError::NotOwner {
            caller: caller.clone(),
        });
    }
    if directory.org_exists(org)? {
        return Err(RegistryError::DuplicateOrg(org.clone()));
    }
    if meta.admin_policy == AdminPolicy::Exclusive {
        if let Some(other) = directory.home_org(org)? {
            return Err(RegistryError::AdminAlreadyAssigned {
                admin: org.clone(),
                org: other,
            });
        }
    }

    directory.insert_org(org, now)?;
    directory.insert_org_admin(org, org, now)?;
    directory.set_home_org(org, org)?;
    Ok(())
}
