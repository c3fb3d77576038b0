// Seeding the controlled vocabulary from CSV
//
// Expected header: code,value,type. Rows whose (type, code) pair already
// exists are skipped, so loading the same file twice is harmless.

use anyhow::Context;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::Path;

use crate::db;
use crate::entities::LookupEntry;

#[derive(Debug, Deserialize)]
struct LookupRow {
    code: Option<String>,
    value: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
}

pub fn load_lookup_csv(csv_path: &Path) -> anyhow::Result<Vec<LookupEntry>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut entries = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let row: LookupRow =
            result.with_context(|| format!("Failed to deserialize lookup row {}", line + 2))?;

        entries.push(LookupEntry {
            id: None,
            code: row.code,
            value: row.value,
            entry_type: row.entry_type,
        });
    }

    Ok(entries)
}

/// Insert entries not already present; returns how many were inserted
pub fn seed_lookups(conn: &Connection, entries: &[LookupEntry]) -> crate::Result<usize> {
    db::in_transaction(conn, |conn| {
        let mut inserted = 0;
        let mut duplicates = 0;

        for entry in entries {
            if LookupEntry::find(conn, entry.entry_type.as_deref(), entry.code.as_deref())?
                .is_some()
            {
                duplicates += 1;
                continue;
            }

            let mut fresh = entry.clone();
            fresh.id = None;
            fresh.save(conn)?;
            inserted += 1;
        }

        tracing::info!(inserted, duplicates, "seeded lookup entries");
        Ok(inserted)
    })
}
