//! Organization/admin directory repository and SQLite implementation.
//!
//! # Responsibility
//! - Persist the provisioning record, organizations, admin memberships and
//!   the admin -> home organization reverse index.
//!
//! # Invariants
//! - Rows are append-only; storage triggers reject UPDATE and DELETE. The one
//!   exception is `admin_index.org`, which follows the most recent join.
//! - `insert_*`/`set_*` methods do not check business preconditions. Callers
//!   run the checks inside the same transaction first.

use crate::error::{RegistryError, RegistryResult};
use crate::model::directory::{AdminPolicy, OrgAdmin, RegistryMeta};
use crate::model::identity::Identity;
use crate::model::Timestamp;
use crate::repo::parse_stored_identity;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Directory data access contract.
pub trait DirectoryRepository {
    /// Loads the provisioning record, if the registry was provisioned.
    fn load_meta(&self) -> RegistryResult<Option<RegistryMeta>>;
    fn insert_meta(&self, meta: &RegistryMeta) -> RegistryResult<()>;
    fn org_exists(&self, org: &Identity) -> RegistryResult<bool>;
    fn insert_org(&self, org: &Identity, registered_at: Timestamp) -> RegistryResult<()>;
    fn is_org_admin(&self, org: &Identity, admin: &Identity) -> RegistryResult<bool>;
    fn insert_org_admin(
        &self,
        org: &Identity,
        admin: &Identity,
        added_at: Timestamp,
    ) -> RegistryResult<()>;
    /// Reverse index lookup: organization the admin acts as.
    fn home_org(&self, admin: &Identity) -> RegistryResult<Option<Identity>>;
    /// Points the admin's reverse index at `org`, replacing any prior entry.
    fn set_home_org(&self, admin: &Identity, org: &Identity) -> RegistryResult<()>;
    /// Organizations sorted by identity.
    fn list_orgs(&self) -> RegistryResult<Vec<Identity>>;
    /// Admins of one organization, in join order.
    fn list_org_admins(&self, org: &Identity) -> RegistryResult<Vec<OrgAdmin>>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn load_meta(&self) -> RegistryResult<Option<RegistryMeta>> {
        let row = self
            .conn
            .query_row(
                "SELECT owner, admin_policy, provisioned_at
                 FROM registry_meta
                 WHERE singleton = 1;",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((owner, policy, provisioned_at)) = row else {
            return Ok(None);
        };
        let admin_policy = AdminPolicy::parse(&policy).ok_or_else(|| {
            RegistryError::InvalidData(format!(
                "invalid admin policy `{policy}` in registry_meta.admin_policy"
            ))
        })?;

        Ok(Some(RegistryMeta {
            owner: parse_stored_identity(&owner, "registry_meta.owner")?,
            admin_policy,
            provisioned_at,
        }))
    }

    fn insert_meta(&self, meta: &RegistryMeta) -> RegistryResult<()> {
        self.conn.execute(
            "INSERT INTO registry_meta (singleton, owner, admin_policy, provisioned_at)
             VALUES (1, ?1, ?2, ?3);",
            params![
                meta.owner.as_str(),
                meta.admin_policy.as_str(),
                meta.provisioned_at
            ],
        )?;
        Ok(())
    }

    fn org_exists(&self, org: &Identity) -> RegistryResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM organizations WHERE org = ?1);",
            [org.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_org(&self, org: &Identity, registered_at: Timestamp) -> RegistryResult<()> {
        self.conn.execute(
            "INSERT INTO organizations (org, registered_at) VALUES (?1, ?2);",
            params![org.as_str(), registered_at],
        )?;
        Ok(())
    }

    fn is_org_admin(&self, org: &Identity, admin: &Identity) -> RegistryResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM org_admins WHERE org = ?1 AND admin = ?2
            );",
            params![org.as_str(), admin.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_org_admin(
        &self,
        org: &Identity,
        admin: &Identity,
        added_at: Timestamp,
    ) -> RegistryResult<()> {
        self.conn.execute(
            "INSERT INTO org_admins (org, admin, added_at) VALUES (?1, ?2, ?3);",
            params![org.as_str(), admin.as_str(), added_at],
        )?;
        Ok(())
    }

    fn home_org(&self, admin: &Identity) -> RegistryResult<Option<Identity>> {
        let org = self
            .conn
            .query_row(
                "SELECT org FROM admin_index WHERE admin = ?1;",
                [admin.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        org.map(|value| parse_stored_identity(&value, "admin_index.org"))
            .transpose()
    }

    fn set_home_org(&self, admin: &Identity, org: &Identity) -> RegistryResult<()> {
        self.conn.execute(
            "INSERT INTO admin_index (admin, org)
             VALUES (?1, ?2)
             ON CONFLICT (admin) DO UPDATE SET org = excluded.org;",
            params![admin.as_str(), org.as_str()],
        )?;
        Ok(())
    }

    fn list_orgs(&self) -> RegistryResult<Vec<Identity>> {
        let mut stmt = self
            .conn
            .prepare("SELECT org FROM organizations ORDER BY org ASC;")?;
        let mut rows = stmt.query([])?;
        let mut orgs = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            orgs.push(parse_stored_identity(&value, "organizations.org")?);
        }
        Ok(orgs)
    }

    fn list_org_admins(&self, org: &Identity) -> RegistryResult<Vec<OrgAdmin>> {
        let mut stmt = self.conn.prepare(
            "SELECT org, admin, added_at
             FROM org_admins
             WHERE org = ?1
             ORDER BY added_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([org.as_str()])?;
        let mut admins = Vec::new();
        while let Some(row) = rows.next()? {
            admins.push(parse_org_admin_row(row)?);
        }
        Ok(admins)
    }
}

fn parse_org_admin_row(row: &Row<'_>) -> RegistryResult<OrgAdmin> {
    let org: String = row.get("org")?;
    let admin: String = row.get("admin")?;
    Ok(OrgAdmin {
        org: parse_stored_identity(&org, "org_admins.org")?,
        admin: parse_stored_identity(&admin, "org_admins.admin")?,
        added_at: row.get("added_at")?,
    })
}
