// Company: an organization owned by one Account and typed by a lookup entry
//
// Created without an account, a company is attached to the first account in
// storage (`default_account_or_fail`); with no account at all the write fails.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audit::{timestamp_param, AuditFields, Audited, AUDIT_COLUMNS};
use crate::db;
use crate::entities::account::default_account_or_fail;
use crate::entities::lookup::{check_choice, COMPANY_TYPE};
use crate::entities::Record;
use crate::error::Result;
use crate::validation::Validator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(flatten)]
    pub audit: AuditFields,

    /// Owning account; `None` means "resolve the default on save"
    pub account_id: Option<i64>,

    pub is_active: bool,

    /// Lookup entry of type "CompanyType"
    pub company_type_id: i64,

    pub name: String,

    /// CNPJ/CPF or similar tax id for international companies
    pub tax_id: Option<String>,

    // Address
    pub address_line_1: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub zipcode: Option<String>,
    pub country: Option<String>,

    // Contact
    pub company_contact_name: Option<String>,
    pub company_contact_phone: Option<String>,
}

impl Company {
    pub fn new(company_type_id: i64, name: &str) -> Self {
        Company {
            audit: AuditFields::default(),
            account_id: None,
            is_active: true,
            company_type_id,
            name: name.to_string(),
            tax_id: None,
            address_line_1: None,
            city: None,
            province: None,
            zipcode: None,
            country: None,
            company_contact_name: None,
            company_contact_phone: None,
        }
    }

    pub fn with_account(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn validate(&self) -> Result<()> {
        Validator::new("Company")
            .required("name", &self.name, 150)
            .max_len("tax_id", self.tax_id.as_deref(), 150)
            .max_len("city", self.city.as_deref(), 50)
            .max_len("province", self.province.as_deref(), 50)
            .max_len("zipcode", self.zipcode.as_deref(), 50)
            .max_len("country", self.country.as_deref(), 50)
            .max_len("company_contact_name", self.company_contact_name.as_deref(), 200)
            .max_len("company_contact_phone", self.company_contact_phone.as_deref(), 200)
            .finish()
    }

    pub fn by_account(conn: &Connection, account_id: i64) -> Result<Vec<Company>> {
        db::select_where(conn, "account_id = ?1", params![account_id])
    }
}

impl Record for Company {
    const TABLE: &'static str = "company";
    const COLUMNS: &'static str = "id, created, last_update, created_by, updated_by, \
         account_id, is_active, company_type_id, name, tax_id, \
         address_line_1, city, province, zipcode, country, \
         company_contact_name, company_contact_phone";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Company {
            audit: AuditFields::from_row(row)?,
            account_id: row.get(5)?,
            is_active: row.get(6)?,
            company_type_id: row.get(7)?,
            name: row.get(8)?,
            tax_id: row.get(9)?,
            address_line_1: row.get(10)?,
            city: row.get(11)?,
            province: row.get(12)?,
            zipcode: row.get(13)?,
            country: row.get(14)?,
            company_contact_name: row.get(15)?,
            company_contact_phone: row.get(16)?,
        })
    }
}

impl Audited for Company {
    fn audit(&self) -> &AuditFields {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }

    fn prepare(&mut self, conn: &Connection) -> Result<()> {
        self.validate()?;

        if self.account_id.is_none() {
            let account = default_account_or_fail(conn)?;
            tracing::debug!(account_id = ?account.audit.id, company = %self.name, "attaching company to default account");
            self.account_id = account.audit.id;
        }

        check_choice(conn, "company_type", self.company_type_id, COMPANY_TYPE)
    }

    fn insert_row(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            &format!(
                "INSERT INTO company ({}, account_id, is_active, company_type_id, name, tax_id,
                     address_line_1, city, province, zipcode, country,
                     company_contact_name, company_contact_phone)
                 VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                AUDIT_COLUMNS
            ),
            params![
                timestamp_param(self.audit.created),
                timestamp_param(self.audit.last_update),
                self.audit.created_by,
                self.audit.updated_by,
                self.account_id,
                self.is_active,
                self.company_type_id,
                self.name,
                self.tax_id,
                self.address_line_1,
                self.city,
                self.province,
                self.zipcode,
                self.country,
                self.company_contact_name,
                self.company_contact_phone,
            ],
        )
    }

    fn update_row(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "UPDATE company
             SET last_update = ?1, created_by = ?2, updated_by = ?3,
                 account_id = ?4, is_active = ?5, company_type_id = ?6, name = ?7, tax_id = ?8,
                 address_line_1 = ?9, city = ?10, province = ?11, zipcode = ?12, country = ?13,
                 company_contact_name = ?14, company_contact_phone = ?15
             WHERE id = ?16",
            params![
                timestamp_param(self.audit.last_update),
                self.audit.created_by,
                self.audit.updated_by,
                self.account_id,
                self.is_active,
                self.company_type_id,
                self.name,
                self.tax_id,
                self.address_line_1,
                self.city,
                self.province,
                self.zipcode,
                self.country,
                self.company_contact_name,
                self.company_contact_phone,
                self.audit.id,
            ],
        )
    }
}

impl fmt::Display for Company {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
