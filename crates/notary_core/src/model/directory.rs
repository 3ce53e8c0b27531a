//! Organization and admin directory model.

use crate::model::identity::Identity;
use crate::model::Timestamp;
use serde::{Deserialize, Serialize};

/// Whether one identity may administer more than one organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminPolicy {
    /// Each admin belongs to exactly one organization.
    #[default]
    Exclusive,
    /// An admin may join several organizations; the one joined most recently
    /// is its home organization for unclaimed ids.
    Shared,
}

impl AdminPolicy {
    /// Stable storage/config value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::Shared => "shared",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exclusive" => Some(Self::Exclusive),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// Provisioning record written once per registry instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMeta {
    /// Process-wide administrator allowed to register organizations.
    pub owner: Identity,
    pub admin_policy: AdminPolicy,
    pub provisioned_at: Timestamp,
}

/// Admin membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgAdmin {
    pub org: Identity,
    pub admin: Identity,
    pub added_at: Timestamp,
}
