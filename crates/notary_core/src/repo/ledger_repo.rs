//! Document ledger repository and SQLite implementation.
//!
//! # Responsibility
//! - Persist document bindings and the digest -> last timestamp index.
//! - Serve ledger read queries (lookups, per-org listing, statistics).
//!
//! # Invariants
//! - `documents` rows are insert-only; storage triggers reject UPDATE/DELETE.
//! - `content_index` rows are upserted, never removed.
//! - Listing order is deterministic: `notarized_at DESC, rowid DESC`.

use crate::error::{RegistryError, RegistryResult};
use crate::model::binding::{DocumentBinding, NotarizationPoint, OrgStats};
use crate::model::identity::{ContentDigest, DocumentId, Identity};
use crate::model::Timestamp;
use crate::repo::parse_stored_identity;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const BINDING_SELECT_SQL: &str = "SELECT
    doc_id,
    org,
    digest,
    notarized_at,
    receipt_id
FROM documents";

/// Default page size for per-organization listings.
pub const DEFAULT_LIST_LIMIT: u32 = 50;
/// Upper bound for per-organization listings.
pub const MAX_LIST_LIMIT: u32 = 500;

/// Paging options for [`LedgerRepository::list_bindings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerListQuery {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl LedgerListQuery {
    /// Effective limit after defaulting and clamping.
    pub fn applied_limit(&self) -> u32 {
        match self.limit {
            None | Some(0) => DEFAULT_LIST_LIMIT,
            Some(value) => value.min(MAX_LIST_LIMIT),
        }
    }
}

/// Ledger data access contract.
pub trait LedgerRepository {
    fn find_binding(&self, id: &DocumentId) -> RegistryResult<Option<DocumentBinding>>;
    fn insert_binding(&self, binding: &DocumentBinding) -> RegistryResult<()>;
    /// Overwrites the digest's last-seen timestamp.
    fn record_content_timestamp(
        &self,
        digest: &ContentDigest,
        timestamp: Timestamp,
    ) -> RegistryResult<()>;
    fn content_timestamp(&self, digest: &ContentDigest) -> RegistryResult<Option<Timestamp>>;
    /// Bindings owned by `org`, newest first.
    fn list_bindings(
        &self,
        org: &Identity,
        query: &LedgerListQuery,
    ) -> RegistryResult<Vec<DocumentBinding>>;
    fn org_stats(&self, org: &Identity) -> RegistryResult<OrgStats>;
}

/// SQLite-backed ledger repository.
pub struct SqliteLedgerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLedgerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn point(
        &self,
        org: &Identity,
        direction: &'static str,
    ) -> RegistryResult<Option<NotarizationPoint>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT digest, notarized_at
                     FROM documents
                     WHERE org = ?1
                     ORDER BY notarized_at {direction}, rowid {direction}
                     LIMIT 1;"
                ),
                [org.as_str()],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        row.map(|(digest, timestamp)| {
            Ok(NotarizationPoint {
                digest: parse_stored_digest(digest)?,
                timestamp,
            })
        })
        .transpose()
    }
}

impl LedgerRepository for SqliteLedgerRepository<'_> {
    fn find_binding(&self, id: &DocumentId) -> RegistryResult<Option<DocumentBinding>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BINDING_SELECT_SQL} WHERE doc_id = ?1;"))?;
        let mut rows = stmt.query([id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_binding_row(row)?));
        }
        Ok(None)
    }

    fn insert_binding(&self, binding: &DocumentBinding) -> RegistryResult<()> {
        self.conn.execute(
            "INSERT INTO documents (doc_id, org, digest, notarized_at, receipt_id)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                binding.id.as_str(),
                binding.org.as_str(),
                binding.digest.as_bytes(),
                binding.notarized_at,
                binding.receipt_id.to_string(),
            ],
        )?;
        Ok(())
    }

    fn record_content_timestamp(
        &self,
        digest: &ContentDigest,
        timestamp: Timestamp,
    ) -> RegistryResult<()> {
        self.conn.execute(
            "INSERT INTO content_index (digest, last_notarized_at)
             VALUES (?1, ?2)
             ON CONFLICT (digest) DO UPDATE
             SET last_notarized_at = excluded.last_notarized_at;",
            params![digest.as_bytes(), timestamp],
        )?;
        Ok(())
    }

    fn content_timestamp(&self, digest: &ContentDigest) -> RegistryResult<Option<Timestamp>> {
        let timestamp = self
            .conn
            .query_row(
                "SELECT last_notarized_at FROM content_index WHERE digest = ?1;",
                [digest.as_bytes()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(timestamp)
    }

    fn list_bindings(
        &self,
        org: &Identity,
        query: &LedgerListQuery,
    ) -> RegistryResult<Vec<DocumentBinding>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BINDING_SELECT_SQL}
             WHERE org = ?1
             ORDER BY notarized_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3;"
        ))?;
        let mut rows = stmt.query(params![
            org.as_str(),
            i64::from(query.applied_limit()),
            i64::from(query.offset),
        ])?;
        let mut bindings = Vec::new();
        while let Some(row) = rows.next()? {
            bindings.push(parse_binding_row(row)?);
        }
        Ok(bindings)
    }

    fn org_stats(&self, org: &Identity) -> RegistryResult<OrgStats> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE org = ?1;",
            [org.as_str()],
            |row| row.get(0),
        )?;
        let total = u64::try_from(total).map_err(|_| {
            RegistryError::InvalidData(format!("negative document count `{total}`"))
        })?;

        Ok(OrgStats {
            org: org.clone(),
            total,
            first: self.point(org, "ASC")?,
            latest: self.point(org, "DESC")?,
        })
    }
}

fn parse_binding_row(row: &Row<'_>) -> RegistryResult<DocumentBinding> {
    let doc_id: String = row.get("doc_id")?;
    let id = DocumentId::parse(doc_id.clone()).map_err(|_| {
        RegistryError::InvalidData(format!("invalid document id `{doc_id}` in documents.doc_id"))
    })?;

    let org: String = row.get("org")?;
    let receipt_text: String = row.get("receipt_id")?;
    let receipt_id = Uuid::parse_str(&receipt_text).map_err(|_| {
        RegistryError::InvalidData(format!(
            "invalid receipt id `{receipt_text}` in documents.receipt_id"
        ))
    })?;

    Ok(DocumentBinding {
        id,
        org: parse_stored_identity(&org, "documents.org")?,
        digest: parse_stored_digest(row.get("digest")?)?,
        notarized_at: row.get("notarized_at")?,
        receipt_id,
    })
}

fn parse_stored_digest(bytes: Vec<u8>) -> RegistryResult<ContentDigest> {
    ContentDigest::from_bytes(bytes)
        .map_err(|err| RegistryError::InvalidData(format!("invalid digest in ledger: {err}")))
}
