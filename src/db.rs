use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, Params};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::entities::Record;
use crate::error::{Result, StoreError};

/// Event for the audit trail: one row per stamped write
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;

    // WAL for crash recovery; in-memory databases answer "memory" instead
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!(path = %path.display(), journal_mode = %mode, "opened database");

    setup_database(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema (tests, dry runs)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Protect-on-delete relies on SQLite enforcing foreign keys
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // ==========================================================================
    // Lookup entries (controlled vocabulary: CompanyType, statusBox, ...)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS lookup_entry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT,
            value TEXT,
            type TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Accounts (is_active is UNIQUE: at most one active and one inactive row)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT,
            last_update TEXT NOT NULL,
            created_by TEXT,
            updated_by TEXT,
            is_active INTEGER NOT NULL DEFAULT 1 UNIQUE,
            name TEXT NOT NULL,
            admin_name TEXT NOT NULL,
            admin_contact_phone TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Companies
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS company (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT,
            last_update TEXT NOT NULL,
            created_by TEXT,
            updated_by TEXT,
            account_id INTEGER NOT NULL REFERENCES account(id) ON DELETE RESTRICT,
            is_active INTEGER NOT NULL DEFAULT 1,
            company_type_id INTEGER NOT NULL REFERENCES lookup_entry(id) ON DELETE RESTRICT,
            name TEXT NOT NULL,
            tax_id TEXT,
            address_line_1 TEXT,
            city TEXT,
            province TEXT,
            zipcode TEXT,
            country TEXT,
            company_contact_name TEXT,
            company_contact_phone TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Boxes
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS box (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created TEXT,
            last_update TEXT NOT NULL,
            created_by TEXT,
            updated_by TEXT,
            status_id INTEGER REFERENCES lookup_entry(id) ON DELETE RESTRICT,
            code INTEGER UNIQUE CHECK (code IS NULL OR code >= 0),
            local_id INTEGER REFERENCES company(id) ON DELETE RESTRICT
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lookup_type ON lookup_entry(type)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_company_account ON company(account_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_box_local ON box(local_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Run `f` inside a transaction. When the caller already opened one, `f` runs
/// under a savepoint so a failure undoes only its own writes.
pub fn in_transaction<T, F>(conn: &Connection, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    if !conn.is_autocommit() {
        conn.execute_batch("SAVEPOINT in_transaction")?;
        return match f(conn) {
            Ok(out) => {
                conn.execute_batch("RELEASE in_transaction")?;
                Ok(out)
            }
            Err(e) => {
                if let Err(rollback) =
                    conn.execute_batch("ROLLBACK TO in_transaction; RELEASE in_transaction")
                {
                    tracing::error!(error = %rollback, "failed to roll back savepoint");
                }
                Err(e)
            }
        };
    }

    let tx = conn.unchecked_transaction()?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

/// Classify a failed INSERT/UPDATE.
pub(crate) fn write_error(err: rusqlite::Error, table: &'static str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::ConstraintViolation {
                table,
                detail: msg.unwrap_or_else(|| e.to_string()),
            }
        }
        other => StoreError::Sqlite(other),
    }
}

// ============================================================================
// Generic record access
// ============================================================================

/// Rows of `R` matching a WHERE clause, in id order
pub(crate) fn select_where<R: Record, P: Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> Result<Vec<R>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY id",
        R::COLUMNS,
        R::TABLE,
        clause
    );
    let mut stmt = conn.prepare(&sql)?;

    let records = stmt
        .query_map(params, |row| R::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn get<R: Record>(conn: &Connection, id: i64) -> Result<R> {
    select_where::<R, _>(conn, "id = ?1", params![id])?
        .into_iter()
        .next()
        .ok_or(StoreError::NotFound { table: R::TABLE, id })
}

pub fn all<R: Record>(conn: &Connection) -> Result<Vec<R>> {
    select_where::<R, _>(conn, "1 = 1", params![])
}

/// Delete by id. Rows that are still referenced are never cascaded.
pub fn delete<R: Record>(conn: &Connection, id: i64) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", R::TABLE);

    match conn.execute(&sql, params![id]) {
        Ok(0) => Err(StoreError::NotFound { table: R::TABLE, id }),
        Ok(_) => {
            tracing::info!(table = R::TABLE, id, "deleted row");
            Ok(())
        }
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            tracing::warn!(table = R::TABLE, id, "delete refused: row is referenced");
            Err(StoreError::ProtectedReference { table: R::TABLE, id })
        }
        Err(e) => Err(write_error(e, R::TABLE)),
    }
}

// ============================================================================
// Audit trail
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Number of rows stored for `R`
pub fn count<R: Record>(conn: &Connection) -> Result<i64> {
    count_rows(conn, R::TABLE)
}

pub(crate) fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Account, LookupEntry};

    #[test]
    fn test_setup_is_idempotent() {
        let conn = open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        for table in ["lookup_entry", "account", "company", "box", "events"] {
            assert_eq!(count_rows(&conn, table).unwrap(), 0, "{} should be empty", table);
        }
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_in_memory().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxes.db");

        let conn = open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(count_rows(&conn, "account").unwrap(), 0);
    }

    #[test]
    fn test_event_log() {
        let conn = open_in_memory().unwrap();

        let event = Event::new(
            "created",
            "box",
            "42",
            serde_json::json!({"code": 1001}),
            "alice",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "box", "42").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "created");
        assert_eq!(events[0].actor, "alice");
        assert_eq!(events[0].data["code"], 1001);
    }

    #[test]
    fn test_count_by_record_type() {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO lookup_entry (code, value, type) VALUES ('WH', 'Warehouse', 'CompanyType')",
            [],
        )
        .unwrap();

        assert_eq!(count::<LookupEntry>(&conn).unwrap(), 1);
        assert_eq!(count::<Account>(&conn).unwrap(), 0);
    }

    #[test]
    fn test_nested_failure_keeps_outer_writes() {
        let conn = open_in_memory().unwrap();
        let tx = conn.unchecked_transaction().unwrap();

        tx.execute(
            "INSERT INTO lookup_entry (code, value, type) VALUES ('WH', 'Warehouse', 'CompanyType')",
            [],
        )
        .unwrap();

        let nested: Result<()> = in_transaction(&tx, |conn| {
            conn.execute(
                "INSERT INTO lookup_entry (code, value, type) VALUES ('A', 'Active', 'statusBox')",
                [],
            )?;
            Err(StoreError::MissingDefaultAccount)
        });
        assert!(nested.is_err());

        let joined = in_transaction(&tx, |conn| {
            conn.execute(
                "INSERT INTO lookup_entry (code, value, type) VALUES ('OPEN', 'Open', 'statusBox')",
                [],
            )?;
            Ok(())
        });
        assert!(joined.is_ok());

        tx.commit().unwrap();

        let codes: Vec<Option<String>> = all::<LookupEntry>(&conn)
            .unwrap()
            .into_iter()
            .map(|entry| entry.code)
            .collect();
        assert_eq!(codes, vec![Some("WH".to_string()), Some("OPEN".to_string())]);
    }

    #[test]
    fn test_in_transaction_rolls_back_on_error() {
        let conn = open_in_memory().unwrap();

        let result: Result<()> = in_transaction(&conn, |conn| {
            conn.execute(
                "INSERT INTO lookup_entry (code, value, type) VALUES ('A', 'Active', 'statusBox')",
                [],
            )?;
            Err(StoreError::MissingDefaultAccount)
        });

        assert!(result.is_err());
        assert_eq!(count_rows(&conn, "lookup_entry").unwrap(), 0);
    }
}
