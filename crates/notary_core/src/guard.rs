//! Access guard: resolves which organization a caller may act as.
//!
//! # Responsibility
//! - Map a caller identity to an organization for one document id.
//! - Map a caller identity to admin rights over one organization.
//!
//! # Invariants
//! - The guard holds no state; it only reads the directory and the ledger.
//! - An unbound id is claimed by the caller's home organization.
//! - A bound id is only ever authorized for its owning organization. A
//!   legitimate admin of another organization is still `Unauthorized`.

use crate::error::{RegistryError, RegistryResult};
use crate::model::binding::DocumentBinding;
use crate::model::directory::AdminPolicy;
use crate::model::identity::{DocumentId, Identity};
use crate::repo::directory_repo::DirectoryRepository;
use crate::repo::ledger_repo::LedgerRepository;

/// Outcome of a successful id authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// Organization the caller acts as for this id.
    pub org: Identity,
    /// Current binding, when the id is already claimed.
    pub existing: Option<DocumentBinding>,
}

/// Resolves the organization `caller` may act as for `id`.
pub fn authorize_for_id(
    directory: &impl DirectoryRepository,
    ledger: &impl LedgerRepository,
    policy: AdminPolicy,
    caller: &Identity,
    id: &DocumentId,
) -> RegistryResult<Authorization> {
    let unauthorized = || RegistryError::Unauthorized {
        caller: caller.clone(),
        document_id: Some(id.clone()),
    };

    let caller_org = directory.home_org(caller)?.ok_or_else(unauthorized)?;

    let Some(binding) = ledger.find_binding(id)? else {
        return Ok(Authorization {
            org: caller_org,
            existing: None,
        });
    };

    let allowed = match policy {
        AdminPolicy::Exclusive => caller_org == binding.org,
        AdminPolicy::Shared => {
            caller_org == binding.org || directory.is_org_admin(&binding.org, caller)?
        }
    };
    if !allowed {
        return Err(unauthorized());
    }

    Ok(Authorization {
        org: binding.org.clone(),
        existing: Some(binding),
    })
}

/// Checks that `caller` administers `org`.
pub fn authorize_for_org(
    directory: &impl DirectoryRepository,
    policy: AdminPolicy,
    caller: &Identity,
    org: &Identity,
) -> RegistryResult<()> {
    let allowed = match policy {
        AdminPolicy::Exclusive => directory.home_org(caller)?.as_ref() == Some(org),
        AdminPolicy::Shared => directory.is_org_admin(org, caller)?,
    };
    if allowed {
        Ok(())
    } else {
        Err(RegistryError::Unauthorized {
            caller: caller.clone(),
            document_id: None,
        })
    }
}
