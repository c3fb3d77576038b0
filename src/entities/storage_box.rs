// Box: a physical unit identified by a unique numeric code
//
// Lives in the `box` table. Status comes from the "statusBox" vocabulary and
// `local` is the company holding it; both are optional.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audit::{timestamp_param, AuditFields, Audited, AUDIT_COLUMNS};
use crate::db;
use crate::entities::lookup::{check_choice, STATUS_BOX};
use crate::entities::Record;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageBox {
    #[serde(flatten)]
    pub audit: AuditFields,

    /// Lookup entry of type "statusBox"
    pub status_id: Option<i64>,

    /// Record number printed on the box; unique when present
    pub code: Option<u32>,

    /// Company holding the box
    pub local_id: Option<i64>,
}

impl StorageBox {
    pub fn new(code: Option<u32>) -> Self {
        StorageBox {
            code,
            ..Default::default()
        }
    }

    pub fn find_by_code(conn: &Connection, code: u32) -> Result<Option<StorageBox>> {
        Ok(db::select_where::<StorageBox, _>(conn, "code = ?1", params![code])?
            .into_iter()
            .next())
    }

    pub fn by_company(conn: &Connection, company_id: i64) -> Result<Vec<StorageBox>> {
        db::select_where(conn, "local_id = ?1", params![company_id])
    }
}

impl Record for StorageBox {
    const TABLE: &'static str = "box";
    const COLUMNS: &'static str =
        "id, created, last_update, created_by, updated_by, status_id, code, local_id";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StorageBox {
            audit: AuditFields::from_row(row)?,
            status_id: row.get(5)?,
            code: row.get(6)?,
            local_id: row.get(7)?,
        })
    }
}

impl Audited for StorageBox {
    fn audit(&self) -> &AuditFields {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }

    fn prepare(&mut self, conn: &Connection) -> Result<()> {
        match self.status_id {
            Some(status_id) => check_choice(conn, "status", status_id, STATUS_BOX),
            None => Ok(()),
        }
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            &format!(
                "INSERT INTO box ({}, status_id, code, local_id)
                 VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                AUDIT_COLUMNS
            ),
            params![
                timestamp_param(self.audit.created),
                timestamp_param(self.audit.last_update),
                self.audit.created_by,
                self.audit.updated_by,
                self.status_id,
                self.code,
                self.local_id,
            ],
        )
    }

    fn update_row(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "UPDATE box
             SET last_update = ?1, created_by = ?2, updated_by = ?3,
                 status_id = ?4, code = ?5, local_id = ?6
             WHERE id = ?7",
            params![
                timestamp_param(self.audit.last_update),
                self.audit.created_by,
                self.audit.updated_by,
                self.status_id,
                self.code,
                self.local_id,
                self.audit.id,
            ],
        )
    }
}

/// The numeric code as text; empty for a box without a code.
impl fmt::Display for StorageBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}", code),
            None => Ok(()),
        }
    }
}
