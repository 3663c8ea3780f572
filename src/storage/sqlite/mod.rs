//! SQLite relational store.
//!
//! One table per record kind keyed by a local `id` with a unique `base_id`
//! (the upstream ExternalID), lookup tables for the foreign keys, join tables
//! for contract/tender ↔ entity associations and `entity_data` for the derived
//! per-entity aggregate. `cache_entries` persists derived cache values
//! across runs.
//!
//! Every record upsert runs in a single transaction together with the
//! association replacement and the staleness marking it causes.

mod aggregates;
mod associations;
mod cache;
mod lookups;
mod records;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{AppError, Result};
use crate::models::RecordKind;

pub use associations::PartyRole;
pub use lookups::{District, LookupTable};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS countries (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS districts (
    id INTEGER PRIMARY KEY,
    base_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    country_id INTEGER NOT NULL REFERENCES countries(id)
);

CREATE TABLE IF NOT EXISTS councils (
    id INTEGER PRIMARY KEY,
    base_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    district_id INTEGER NOT NULL REFERENCES districts(id)
);

CREATE TABLE IF NOT EXISTS contract_types (
    id INTEGER PRIMARY KEY,
    base_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS procedure_types (
    id INTEGER PRIMARY KEY,
    base_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS act_types (
    id INTEGER PRIMARY KEY,
    base_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS model_types (
    id INTEGER PRIMARY KEY,
    base_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    description_pt TEXT NOT NULL DEFAULT '',
    description_en TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY,
    base_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    nif TEXT NOT NULL,
    country_id INTEGER REFERENCES countries(id)
);

CREATE TABLE IF NOT EXISTS entity_data (
    entity_id INTEGER PRIMARY KEY REFERENCES entities(id),
    total_earned INTEGER NOT NULL DEFAULT 0,
    total_expended INTEGER NOT NULL DEFAULT 0,
    last_activity TEXT,
    is_fresh INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS contracts (
    id INTEGER PRIMARY KEY,
    base_id INTEGER NOT NULL UNIQUE,
    added_date TEXT NOT NULL,
    signing_date TEXT,
    contract_type_id INTEGER REFERENCES contract_types(id),
    procedure_type_id INTEGER REFERENCES procedure_types(id),
    description TEXT,
    contract_description TEXT NOT NULL,
    cpvs TEXT,
    category_id INTEGER REFERENCES categories(id),
    price INTEGER NOT NULL,
    country_id INTEGER REFERENCES countries(id),
    district_id INTEGER REFERENCES districts(id),
    council_id INTEGER REFERENCES councils(id)
);
CREATE INDEX IF NOT EXISTS contracts_signing_date ON contracts(signing_date);

CREATE TABLE IF NOT EXISTS contract_contractors (
    contract_id INTEGER NOT NULL REFERENCES contracts(id),
    entity_id INTEGER NOT NULL REFERENCES entities(id),
    PRIMARY KEY (contract_id, entity_id)
);
CREATE INDEX IF NOT EXISTS contract_contractors_entity ON contract_contractors(entity_id);

CREATE TABLE IF NOT EXISTS contract_contracted (
    contract_id INTEGER NOT NULL REFERENCES contracts(id),
    entity_id INTEGER NOT NULL REFERENCES entities(id),
    PRIMARY KEY (contract_id, entity_id)
);
CREATE INDEX IF NOT EXISTS contract_contracted_entity ON contract_contracted(entity_id);

CREATE TABLE IF NOT EXISTS tenders (
    id INTEGER PRIMARY KEY,
    base_id INTEGER NOT NULL UNIQUE,
    description TEXT,
    act_type_id INTEGER REFERENCES act_types(id),
    model_type_id INTEGER REFERENCES model_types(id),
    contract_type_id INTEGER REFERENCES contract_types(id),
    announcement_number TEXT,
    publication_date TEXT NOT NULL,
    deadline_date TEXT NOT NULL,
    cpvs TEXT,
    category_id INTEGER REFERENCES categories(id),
    price INTEGER,
    dre_number INTEGER NOT NULL,
    dre_series INTEGER NOT NULL,
    dre_document INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tender_contractors (
    tender_id INTEGER NOT NULL REFERENCES tenders(id),
    entity_id INTEGER NOT NULL REFERENCES entities(id),
    PRIMARY KEY (tender_id, entity_id)
);

CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
"#;

/// SQLite-backed store for records, lookups and entity aggregates.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::storage("sqlite connection mutex poisoned"))
    }

    /// Run a read-only query against the connection.
    ///
    /// This is the seam analysis functions use to aggregate over the store.
    pub fn query<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn()?;
        Ok(f(&conn)?)
    }

    /// Number of stored records of `kind`.
    pub fn count(&self, kind: RecordKind) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        self.query(|conn| conn.query_row(&sql, [], |row| row.get(0)))
    }

    /// Highest stored ExternalID of `kind`.
    pub fn max_base_id(&self, kind: RecordKind) -> Result<Option<i64>> {
        let sql = format!("SELECT MAX(base_id) FROM {}", kind.table());
        self.query(|conn| conn.query_row(&sql, [], |row| row.get(0)))
    }

    /// Local row id of the record with ExternalID `base_id`.
    pub fn record_id(&self, kind: RecordKind, base_id: i64) -> Result<Option<i64>> {
        let sql = format!("SELECT id FROM {} WHERE base_id = ?1", kind.table());
        self.query(|conn| {
            conn.query_row(&sql, params![base_id], |row| row.get(0))
                .optional()
        })
    }

    pub fn exists(&self, kind: RecordKind, base_id: i64) -> Result<bool> {
        Ok(self.record_id(kind, base_id)?.is_some())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders shared by the store and service tests.

    use chrono::NaiveDate;

    use super::SqliteStore;
    use crate::models::{ContractRecord, EntityRecord};

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn entity(store: &SqliteStore, base_id: i64, name: &str) -> i64 {
        store
            .upsert_entity(&EntityRecord {
                base_id,
                name: name.to_string(),
                nif: format!("nif{base_id}"),
                country_id: None,
            })
            .unwrap()
            .id
    }

    pub fn contract(base_id: i64, price: i64, contractors: Vec<i64>, contracted: Vec<i64>) -> ContractRecord {
        ContractRecord {
            base_id,
            added_date: date(2003, 1, 1),
            signing_date: None,
            contract_type_id: None,
            procedure_type_id: None,
            description: None,
            contract_description: "da".to_string(),
            cpvs: None,
            category_id: None,
            price,
            country_id: None,
            district_id: None,
            council_id: None,
            contractors,
            contracted,
        }
    }
}
