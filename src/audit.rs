//! Audit fields shared by every account, company and box, and the stamping
//! operation that records who created and who last touched a row.
//!
//! `created` is assigned once, on the first persist, and never rewritten:
//! the UPDATE statements of the entities leave that column alone.
//! `last_update` is refreshed on every persist and never moves backwards.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{self, Event};
use crate::entities::Record;
use crate::error::{Result, StoreError};
use crate::validation::Validator;

/// Leading columns of every audited table, in `AuditFields::from_row` order.
pub const AUDIT_COLUMNS: &str = "id, created, last_update, created_by, updated_by";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFields {
    /// Surrogate key assigned by storage; `None` until the first persist
    pub id: Option<i64>,
    pub created: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl AuditFields {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Record `actor` as the updater, and as the creator if nobody is yet.
    pub fn mark(&mut self, actor: &str) {
        if self.created_by.as_deref().map_or(true, str::is_empty) {
            self.created_by = Some(actor.to_string());
        }
        self.updated_by = Some(actor.to_string());
    }

    fn touch(&mut self, now: DateTime<Utc>, inserting: bool) {
        if inserting {
            self.created = Some(now);
        }
        self.last_update = Some(match self.last_update {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }

    /// Read the five leading audit columns of a row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AuditFields {
            id: Some(row.get(0)?),
            created: timestamp_at(row, 1)?,
            last_update: timestamp_at(row, 2)?,
            created_by: row.get(3)?,
            updated_by: row.get(4)?,
        })
    }
}

pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) fn timestamp_param(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|dt| dt.to_rfc3339())
}

/// An entity carrying `AuditFields`, persisted through `save` / `stamp_audit`.
pub trait Audited: Record + Clone + Serialize {
    fn audit(&self) -> &AuditFields;

    fn audit_mut(&mut self) -> &mut AuditFields;

    /// Resolve defaults and check field constraints right before a write.
    fn prepare(&mut self, _conn: &Connection) -> Result<()> {
        Ok(())
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<usize>;

    fn update_row(&self, conn: &Connection) -> rusqlite::Result<usize>;
}

fn persist<E: Audited>(conn: &Connection, entity: &mut E) -> Result<i64> {
    entity.prepare(conn)?;

    let inserting = !entity.audit().is_persisted();
    entity.audit_mut().touch(Utc::now(), inserting);

    match entity.audit().id {
        None => {
            entity
                .insert_row(conn)
                .map_err(|e| db::write_error(e, E::TABLE))?;
            let id = conn.last_insert_rowid();
            entity.audit_mut().id = Some(id);
            Ok(id)
        }
        Some(id) => {
            let updated = entity
                .update_row(conn)
                .map_err(|e| db::write_error(e, E::TABLE))?;
            if updated == 0 {
                return Err(StoreError::NotFound { table: E::TABLE, id });
            }
            Ok(id)
        }
    }
}

/// Persist without touching `created_by` / `updated_by`.
///
/// The entity is only modified when the write succeeds.
pub fn save<E: Audited>(conn: &Connection, entity: &mut E) -> Result<()> {
    let mut staged = entity.clone();
    persist(conn, &mut staged)?;
    *entity = staged;
    Ok(())
}

/// Stamp `actor` onto the entity and write it immediately.
///
/// `created_by` is filled only when unset or empty, `updated_by` always.
/// The row and its audit-trail event commit together; any persistence
/// error is returned as-is and leaves the entity untouched.
pub fn stamp_audit<E: Audited>(conn: &Connection, entity: &mut E, actor: &str) -> Result<()> {
    Validator::new("Audit").required("actor", actor, usize::MAX).finish()?;

    let mut staged = entity.clone();
    staged.audit_mut().mark(actor);
    let event_type = if staged.audit().is_persisted() {
        "updated"
    } else {
        "created"
    };

    let id = db::in_transaction(conn, |conn| {
        let id = persist(conn, &mut staged)?;
        let event = Event::new(
            event_type,
            E::TABLE,
            &id.to_string(),
            serde_json::to_value(&staged)?,
            actor,
        );
        db::insert_event(conn, &event)?;
        Ok(id)
    })?;

    tracing::info!(table = E::TABLE, id, actor, event_type, "stamped audit fields");
    *entity = staged;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Account, Company, LookupEntry, StorageBox};
    use crate::entities::lookup::{COMPANY_TYPE, STATUS_BOX};

    #[test]
    fn test_mark_sets_creator_once() {
        let mut audit = AuditFields::default();

        audit.mark("u1");
        assert_eq!(audit.created_by.as_deref(), Some("u1"));
        assert_eq!(audit.updated_by.as_deref(), Some("u1"));

        audit.mark("u2");
        assert_eq!(audit.created_by.as_deref(), Some("u1"));
        assert_eq!(audit.updated_by.as_deref(), Some("u2"));
    }

    #[test]
    fn test_mark_replaces_empty_creator() {
        let mut audit = AuditFields {
            created_by: Some(String::new()),
            ..Default::default()
        };

        audit.mark("u2");
        assert_eq!(audit.created_by.as_deref(), Some("u2"));
    }

    #[test]
    fn test_stamp_twice_keeps_first_creator() {
        let conn = db::open_in_memory().unwrap();
        let mut account = Account::new("Acme", "Ana", "+55 81 5555-0000");

        stamp_audit(&conn, &mut account, "u1").unwrap();
        stamp_audit(&conn, &mut account, "u2").unwrap();

        let stored: Account = db::get(&conn, account.audit.id.unwrap()).unwrap();
        assert_eq!(stored.audit.created_by.as_deref(), Some("u1"));
        assert_eq!(stored.audit.updated_by.as_deref(), Some("u2"));
    }

    #[test]
    fn test_stamp_applies_to_every_audited_entity() {
        let conn = db::open_in_memory().unwrap();

        let mut company_type = LookupEntry::new("WH", "Warehouse", COMPANY_TYPE);
        company_type.save(&conn).unwrap();
        let mut status = LookupEntry::new("OPEN", "Open", STATUS_BOX);
        status.save(&conn).unwrap();

        let mut account = Account::new("Acme", "Ana", "123");
        stamp_audit(&conn, &mut account, "u1").unwrap();

        let mut company = Company::new(company_type.id.unwrap(), "Depot");
        stamp_audit(&conn, &mut company, "u1").unwrap();
        stamp_audit(&conn, &mut company, "u2").unwrap();

        let mut storage_box = StorageBox::new(Some(7));
        storage_box.status_id = status.id;
        storage_box.local_id = company.audit.id;
        stamp_audit(&conn, &mut storage_box, "u1").unwrap();
        stamp_audit(&conn, &mut storage_box, "u2").unwrap();

        for audit in [&company.audit, &storage_box.audit] {
            assert_eq!(audit.created_by.as_deref(), Some("u1"));
            assert_eq!(audit.updated_by.as_deref(), Some("u2"));
        }
    }

    #[test]
    fn test_created_is_fixed_and_last_update_moves_forward() {
        let conn = db::open_in_memory().unwrap();
        let mut account = Account::new("Acme", "Ana", "123");

        stamp_audit(&conn, &mut account, "u1").unwrap();
        let created = account.audit.created;
        let first_update = account.audit.last_update;
        assert!(created.is_some());

        std::thread::sleep(std::time::Duration::from_millis(5));
        account.name = "Acme Logistics".to_string();
        stamp_audit(&conn, &mut account, "u2").unwrap();

        let stored: Account = db::get(&conn, account.audit.id.unwrap()).unwrap();
        assert_eq!(stored.audit.created, created);
        assert!(stored.audit.last_update >= first_update);
        assert_eq!(stored.name, "Acme Logistics");
    }

    #[test]
    fn test_update_never_rewrites_created() {
        let conn = db::open_in_memory().unwrap();
        let mut account = Account::new("Acme", "Ana", "123");
        save(&conn, &mut account).unwrap();
        let created = account.audit.created;

        // A caller tampering with the in-memory value does not reach storage
        account.audit.created = None;
        save(&conn, &mut account).unwrap();

        let stored: Account = db::get(&conn, account.audit.id.unwrap()).unwrap();
        assert_eq!(stored.audit.created, created);
    }

    #[test]
    fn test_stamp_records_events() {
        let conn = db::open_in_memory().unwrap();
        let mut account = Account::new("Acme", "Ana", "123");

        stamp_audit(&conn, &mut account, "u1").unwrap();
        stamp_audit(&conn, &mut account, "u2").unwrap();

        let id = account.audit.id.unwrap().to_string();
        let events = db::get_events_for_entity(&conn, "account", &id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "created");
        assert_eq!(events[0].actor, "u1");
        assert_eq!(events[1].event_type, "updated");
        assert_eq!(events[1].actor, "u2");
        assert_eq!(events[1].data["name"], "Acme");
    }

    #[test]
    fn test_failed_stamp_leaves_entity_and_trail_untouched() {
        let conn = db::open_in_memory().unwrap();
        let mut first = Account::new("Acme", "Ana", "123");
        stamp_audit(&conn, &mut first, "u1").unwrap();

        let mut second = Account::new("Other", "Bo", "456");
        let err = stamp_audit(&conn, &mut second, "u2").unwrap_err();

        assert!(matches!(err, StoreError::ConstraintViolation { table: "account", .. }));
        assert!(second.audit.id.is_none());
        assert!(second.audit.created_by.is_none());
        assert_eq!(db::count_rows(&conn, "events").unwrap(), 1);
    }

    #[test]
    fn test_empty_actor_rejected() {
        let conn = db::open_in_memory().unwrap();
        let mut account = Account::new("Acme", "Ana", "123");

        let err = stamp_audit(&conn, &mut account, "").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(db::count_rows(&conn, "account").unwrap(), 0);
    }
}
