//! Document binding read models and notarization event payloads.
//!
//! # Invariants
//! - A binding is created exactly once per document id and never changes.
//! - `DocumentNotarized` is produced only for a committed binding.

use crate::model::identity::{ContentDigest, DocumentId, Identity};
use crate::model::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permanent association of a document id to organization, digest and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBinding {
    pub id: DocumentId,
    /// Organization that claimed the id on first notarization.
    pub org: Identity,
    pub digest: ContentDigest,
    pub notarized_at: Timestamp,
    /// Receipt handed back to the submitting caller.
    pub receipt_id: Uuid,
}

impl DocumentBinding {
    /// Event payload describing this binding.
    pub fn to_event(&self) -> DocumentNotarized {
        DocumentNotarized {
            org: self.org.clone(),
            id: self.id.clone(),
            digest: self.digest.clone(),
            timestamp: self.notarized_at,
        }
    }
}

/// Observer-facing notification fired once per successful bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNotarized {
    pub org: Identity,
    pub id: DocumentId,
    pub digest: ContentDigest,
    pub timestamp: Timestamp,
}

/// One end of an organization's notarization range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizationPoint {
    pub digest: ContentDigest,
    pub timestamp: Timestamp,
}

/// Aggregate figures for one organization's ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgStats {
    pub org: Identity,
    pub total: u64,
    pub first: Option<NotarizationPoint>,
    pub latest: Option<NotarizationPoint>,
}

/// Result of checking whether a digest was ever anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    /// Timestamp of the most recent binding that used the digest.
    pub timestamp: Option<Timestamp>,
}

impl Verification {
    pub fn from_timestamp(timestamp: Option<Timestamp>) -> Self {
        Self {
            verified: timestamp.is_some(),
            timestamp,
        }
    }
}
