// Box Tracker - Core Library
// Accounts, companies, lookup vocabulary and boxes on SQLite, with audit stamping

pub mod audit;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod seed;
pub mod validation;

// Re-export commonly used types
pub use audit::{save, stamp_audit, AuditFields, Audited};
pub use config::Config;
pub use db::{
    Event,
    open, open_in_memory, setup_database, in_transaction,
    get, all, delete, count,
    insert_event, get_events_for_entity,
};
pub use entities::{
    Account, Company, LookupEntry, StorageBox, Record,
    default_account, default_account_or_fail,
};
pub use entities::lookup::{COMPANY_TYPE, STATUS_BOX};
pub use error::{Result, StoreError};
pub use seed::{load_lookup_csv, seed_lookups};
pub use validation::{ValidationError, ValidationErrors};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
