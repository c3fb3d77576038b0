// Account: the top-level tenant record
//
// `is_active` is UNIQUE across the table, so at most one active and one
// inactive account can exist. The first account (lowest id) is the owner a
// company falls back to when none is given.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audit::{timestamp_param, AuditFields, Audited, AUDIT_COLUMNS};
use crate::db;
use crate::entities::Record;
use crate::error::{Result, StoreError};
use crate::validation::Validator;

const MAX_LEN: usize = 150;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(flatten)]
    pub audit: AuditFields,

    pub is_active: bool,

    pub name: String,

    pub admin_name: String,

    pub admin_contact_phone: String,
}

impl Account {
    /// New active account, not yet persisted
    pub fn new(name: &str, admin_name: &str, admin_contact_phone: &str) -> Self {
        Account {
            audit: AuditFields::default(),
            is_active: true,
            name: name.to_string(),
            admin_name: admin_name.to_string(),
            admin_contact_phone: admin_contact_phone.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        Validator::new("Account")
            .required("name", &self.name, MAX_LEN)
            .required("admin_name", &self.admin_name, MAX_LEN)
            .required("admin_contact_phone", &self.admin_contact_phone, MAX_LEN)
            .finish()
    }
}

/// First account in storage order, if any.
pub fn default_account(conn: &Connection) -> Result<Option<Account>> {
    Ok(
        db::select_where::<Account, _>(conn, "id = (SELECT MIN(id) FROM account)", params![])?
            .into_iter()
            .next(),
    )
}

/// Owner for a company created without an explicit account.
///
/// This is what makes the system single-tenant unless callers always pass an
/// account.
pub fn default_account_or_fail(conn: &Connection) -> Result<Account> {
    default_account(conn)?.ok_or(StoreError::MissingDefaultAccount)
}

impl Record for Account {
    const TABLE: &'static str = "account";
    const COLUMNS: &'static str = "id, created, last_update, created_by, updated_by, \
         is_active, name, admin_name, admin_contact_phone";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Account {
            audit: AuditFields::from_row(row)?,
            is_active: row.get(5)?,
            name: row.get(6)?,
            admin_name: row.get(7)?,
            admin_contact_phone: row.get(8)?,
        })
    }
}

impl Audited for Account {
    fn audit(&self) -> &AuditFields {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }

    fn prepare(&mut self, _conn: &Connection) -> Result<()> {
        self.validate()
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            &format!(
                "INSERT INTO account ({}, is_active, name, admin_name, admin_contact_phone)
                 VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                AUDIT_COLUMNS
            ),
            params![
                timestamp_param(self.audit.created),
                timestamp_param(self.audit.last_update),
                self.audit.created_by,
                self.audit.updated_by,
                self.is_active,
                self.name,
                self.admin_name,
                self.admin_contact_phone,
            ],
        )
    }

    fn update_row(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "UPDATE account
             SET last_update = ?1, created_by = ?2, updated_by = ?3,
                 is_active = ?4, name = ?5, admin_name = ?6, admin_contact_phone = ?7
             WHERE id = ?8",
            params![
                timestamp_param(self.audit.last_update),
                self.audit.created_by,
                self.audit.updated_by,
                self.is_active,
                self.name,
                self.admin_name,
                self.admin_contact_phone,
                self.audit.id,
            ],
        )
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
