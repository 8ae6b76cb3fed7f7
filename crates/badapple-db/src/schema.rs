//! Table names, identifier validation and DDL.
//!
//! Schema and table names are chosen by the operator and end up inside SQL
//! text, so they only enter the store through [`Identifier`]. Data values are
//! always bound as parameters.

use crate::error::{DbError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

pub const TABLE_COMPOUND: &str = "compound";
pub const TABLE_SUB2CPD: &str = "sub2cpd";
pub const TABLE_ACTIVITY: &str = "activity";
pub const TABLE_SCAF2CPD: &str = "scaf2cpd";
pub const TABLE_SCAF2ACTIVEAID: &str = "scaf2activeaid";
pub const TABLE_METADATA: &str = "metadata";
pub const DEFAULT_SCAFFOLD_TABLE: &str = "scaffold";

lazy_static! {
    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// A validated SQL identifier (schema, table or column name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.len() > 63 || !IDENT_RE.is_match(&name) {
            return Err(DbError::InvalidIdentifier(name));
        }
        Ok(Self(name))
    }

    /// The stock scaffold table.
    pub fn default_scaffold_table() -> Self {
        Self(DEFAULT_SCAFFOLD_TABLE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = DbError;

    fn try_from(value: &str) -> Result<Self> {
        Identifier::new(value)
    }
}

/// Where the engine's tables live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    /// Schema holding compound, scaffold and association tables.
    pub schema: Identifier,
    /// Schema holding the raw `activity` table.
    pub activity_schema: Identifier,
    /// Assay id column of the `activity` table.
    pub assay_column: Identifier,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            schema: Identifier("public".to_string()),
            activity_schema: Identifier("public".to_string()),
            assay_column: Identifier("aid".to_string()),
        }
    }
}

impl StoreLayout {
    pub fn new(schema: &str, activity_schema: &str, assay_column: &str) -> Result<Self> {
        Ok(Self {
            schema: Identifier::new(schema)?,
            activity_schema: Identifier::new(activity_schema)?,
            assay_column: Identifier::new(assay_column)?,
        })
    }

    /// `schema.table` for a table in the main schema.
    pub fn table(&self, table: &str) -> String {
        format!("{}.{}", self.schema, table)
    }

    /// `activity_schema.activity`.
    pub fn activity_table(&self) -> String {
        format!("{}.{}", self.activity_schema, TABLE_ACTIVITY)
    }

    /// `CREATE ... IF NOT EXISTS` statements for every table the engine reads
    /// or writes, in dependency order.
    pub fn ddl(&self) -> Vec<String> {
        let counters = "nsub_total BIGINT, nsub_tested BIGINT, nsub_active BIGINT, \
                        nass_tested BIGINT, nass_active BIGINT, \
                        nsam_tested BIGINT, nsam_active BIGINT";
        vec![
            format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema),
            format!("CREATE SCHEMA IF NOT EXISTS {}", self.activity_schema),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (cid BIGINT PRIMARY KEY, {counters})",
                self.table(TABLE_COMPOUND)
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (sid BIGINT PRIMARY KEY, cid BIGINT NOT NULL)",
                self.table(TABLE_SUB2CPD)
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS sub2cpd_cid_idx ON {} (cid)",
                self.table(TABLE_SUB2CPD)
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (sid BIGINT NOT NULL, {} BIGINT NOT NULL, outcome SMALLINT)",
                self.activity_table(),
                self.assay_column
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS activity_sid_idx ON {} (sid)",
                self.activity_table()
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (id BIGINT PRIMARY KEY, \
                 ncpd_total BIGINT, ncpd_tested BIGINT, ncpd_active BIGINT, {counters}, \
                 pscore DOUBLE PRECISION)",
                self.table(DEFAULT_SCAFFOLD_TABLE)
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (scafid BIGINT NOT NULL, cid BIGINT NOT NULL, \
                 PRIMARY KEY (scafid, cid))",
                self.table(TABLE_SCAF2CPD)
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (scafid BIGINT NOT NULL, aid BIGINT NOT NULL, \
                 PRIMARY KEY (scafid, aid))",
                self.table(TABLE_SCAF2ACTIVEAID)
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (median_ncpd_tested DOUBLE PRECISION, \
                 median_nsub_tested DOUBLE PRECISION, median_nass_tested DOUBLE PRECISION, \
                 median_nsam_tested DOUBLE PRECISION)",
                self.table(TABLE_METADATA)
            ),
        ]
    }

    /// DDL for an alternative scaffold table holding a separate configuration.
    pub fn scaffold_copy_ddl(&self, table: &Identifier) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (LIKE {} INCLUDING ALL)",
            self.table(table.as_str()),
            self.table(DEFAULT_SCAFFOLD_TABLE)
        )
    }
}
