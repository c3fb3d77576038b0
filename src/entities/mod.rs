// Persisted records of the box-tracking back office
//
// Account → Company → StorageBox, with LookupEntry supplying the controlled
// vocabulary (company types, box statuses). Every reference is
// protect-on-delete: a referenced row cannot be removed.

use rusqlite::Row;

pub mod account;
pub mod company;
pub mod lookup;
pub mod storage_box;

pub use account::{default_account, default_account_or_fail, Account};
pub use company::Company;
pub use lookup::LookupEntry;
pub use storage_box::StorageBox;

/// A table-backed record that can be read back with `db::get` / `db::all`.
pub trait Record: Sized {
    const TABLE: &'static str;

    /// SELECT list matching `from_row`
    const COLUMNS: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}
