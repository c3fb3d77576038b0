// Lookup entries: typed code/value pairs used as a constrained vocabulary
//
// Consumers filter by `type` to get the valid choices for a field, e.g. all
// entries with type "statusBox" are the statuses a box may carry.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db;
use crate::entities::Record;
use crate::error::{Result, StoreError};
use crate::validation::Validator;

/// Discriminator for company types
pub const COMPANY_TYPE: &str = "CompanyType";

/// Discriminator for box statuses
pub const STATUS_BOX: &str = "statusBox";

const MAX_LEN: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub id: Option<i64>,
    pub code: Option<String>,
    /// Display label
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
}

impl LookupEntry {
    pub fn new(code: &str, value: &str, entry_type: &str) -> Self {
        LookupEntry {
            id: None,
            code: Some(code.to_string()),
            value: Some(value.to_string()),
            entry_type: Some(entry_type.to_string()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        Validator::new("LookupEntry")
            .max_len("code", self.code.as_deref(), MAX_LEN)
            .max_len("value", self.value.as_deref(), MAX_LEN)
            .max_len("type", self.entry_type.as_deref(), MAX_LEN)
            .finish()
    }

    /// Insert or update
    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        self.validate()?;

        match self.id {
            None => {
                conn.execute(
                    "INSERT INTO lookup_entry (code, value, type) VALUES (?1, ?2, ?3)",
                    params![self.code, self.value, self.entry_type],
                )
                .map_err(|e| db::write_error(e, Self::TABLE))?;
                self.id = Some(conn.last_insert_rowid());
            }
            Some(id) => db::in_transaction(conn, |conn| {
                self.check_retype(conn, id)?;
                conn.execute(
                    "UPDATE lookup_entry SET code = ?1, value = ?2, type = ?3 WHERE id = ?4",
                    params![self.code, self.value, self.entry_type, id],
                )
                .map_err(|e| db::write_error(e, Self::TABLE))?;
                Ok(())
            })?,
        }

        Ok(())
    }

    /// Referencing rows were checked against the stored type, so a referenced
    /// entry may change its code or value but not its type.
    fn check_retype(&self, conn: &Connection, id: i64) -> Result<()> {
        let current: Option<String> = conn
            .query_row(
                "SELECT type FROM lookup_entry WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                table: Self::TABLE,
                id,
            })?;

        if current == self.entry_type {
            return Ok(());
        }

        let referenced: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM company WHERE company_type_id = ?1)
                 OR EXISTS (SELECT 1 FROM box WHERE status_id = ?1)",
            params![id],
            |row| row.get(0),
        )?;

        if referenced {
            tracing::warn!(
                id,
                from = ?current,
                to = ?self.entry_type,
                "type change refused: entry is referenced"
            );
            return Err(StoreError::ProtectedReference {
                table: Self::TABLE,
                id,
            });
        }

        Ok(())
    }

    /// Valid choice set for a constrained field
    pub fn choices(conn: &Connection, entry_type: &str) -> Result<Vec<LookupEntry>> {
        db::select_where(conn, "type = ?1", params![entry_type])
    }

    /// First entry with this (type, code) pair; `None` matches a NULL column
    pub fn find(
        conn: &Connection,
        entry_type: Option<&str>,
        code: Option<&str>,
    ) -> Result<Option<LookupEntry>> {
        let found = db::select_where::<LookupEntry, _>(
            conn,
            "type IS ?1 AND code IS ?2",
            params![entry_type, code],
        )?;
        Ok(found.into_iter().next())
    }
}

impl Record for LookupEntry {
    const TABLE: &'static str = "lookup_entry";
    const COLUMNS: &'static str = "id, code, value, type";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LookupEntry {
            id: Some(row.get(0)?),
            code: row.get(1)?,
            value: row.get(2)?,
            entry_type: row.get(3)?,
        })
    }
}

impl fmt::Display for LookupEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value.as_deref().unwrap_or(""))
    }
}

/// Fail unless `lookup_id` names an entry whose type is `expected`.
pub fn check_choice(
    conn: &Connection,
    field: &'static str,
    lookup_id: i64,
    expected: &'static str,
) -> Result<()> {
    let entry_type: Option<Option<String>> = conn
        .query_row(
            "SELECT type FROM lookup_entry WHERE id = ?1",
            params![lookup_id],
            |row| row.get(0),
        )
        .optional()?;

    match entry_type {
        Some(Some(t)) if t == expected => Ok(()),
        _ => Err(StoreError::InvalidChoice {
            field,
            expected,
            lookup_id,
        }),
    }
}
