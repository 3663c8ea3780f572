//! Static lookup tables: geography, act/contract/procedure/model types and
//! CPV categories.

use std::collections::HashMap;

use rusqlite::{OptionalExtension, params};

use super::SqliteStore;
use crate::error::Result;

/// Lookup tables keyed by an upstream id with a descriptive name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupTable {
    ContractType,
    ProcedureType,
    ActType,
    ModelType,
}

impl LookupTable {
    pub const ALL: [LookupTable; 4] = [
        LookupTable::ContractType,
        LookupTable::ProcedureType,
        LookupTable::ActType,
        LookupTable::ModelType,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            LookupTable::ContractType => "contract_types",
            LookupTable::ProcedureType => "procedure_types",
            LookupTable::ActType => "act_types",
            LookupTable::ModelType => "model_types",
        }
    }

    /// Upstream list endpoint, relative to the API root.
    pub fn endpoint(&self) -> &'static str {
        match self {
            LookupTable::ContractType => "lista/tipocontratos",
            LookupTable::ProcedureType => "lista/tipoprocedimentos",
            LookupTable::ActType => "lista/tipoatos",
            LookupTable::ModelType => "lista/tipomodelos",
        }
    }
}

/// A district row as needed to crawl its councils.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct District {
    pub id: i64,
    pub base_id: i64,
    pub name: String,
}

impl SqliteStore {
    /// Local id of the lookup row named `name`.
    pub fn lookup_id(&self, table: LookupTable, name: &str) -> Result<Option<i64>> {
        let sql = format!("SELECT id FROM {} WHERE name = ?1 ORDER BY id LIMIT 1", table.table());
        self.query(|conn| conn.query_row(&sql, params![name], |row| row.get(0)).optional())
    }

    /// Insert a lookup row unless its upstream id is already present.
    pub fn insert_lookup(&self, table: LookupTable, base_id: i64, name: &str) -> Result<bool> {
        let sql = format!("INSERT OR IGNORE INTO {} (base_id, name) VALUES (?1, ?2)", table.table());
        self.query(|conn| conn.execute(&sql, params![base_id, name]))
            .map(|n| n > 0)
    }

    pub fn lookup_count(&self, table: LookupTable) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.table());
        self.query(|conn| conn.query_row(&sql, [], |row| row.get(0)))
    }

    pub fn country_id(&self, name: &str) -> Result<Option<i64>> {
        self.query(|conn| {
            conn.query_row("SELECT id FROM countries WHERE name = ?1", params![name], |row| row.get(0))
                .optional()
        })
    }

    pub fn insert_country(&self, name: &str) -> Result<bool> {
        self.query(|conn| conn.execute("INSERT OR IGNORE INTO countries (name) VALUES (?1)", params![name]))
            .map(|n| n > 0)
    }

    pub fn country_count(&self) -> Result<i64> {
        self.query(|conn| conn.query_row("SELECT COUNT(*) FROM countries", [], |row| row.get(0)))
    }

    /// District named `name` within `country_id`.
    pub fn district_id(&self, name: &str, country_id: i64) -> Result<Option<i64>> {
        self.query(|conn| {
            conn.query_row(
                "SELECT id FROM districts WHERE name = ?1 AND country_id = ?2",
                params![name, country_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn insert_district(&self, base_id: i64, name: &str, country_id: i64) -> Result<bool> {
        self.query(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO districts (base_id, name, country_id) VALUES (?1, ?2, ?3)",
                params![base_id, name, country_id],
            )
        })
        .map(|n| n > 0)
    }

    pub fn districts(&self) -> Result<Vec<District>> {
        self.query(|conn| {
            let mut stmt = conn.prepare("SELECT id, base_id, name FROM districts ORDER BY base_id")?;
            let rows = stmt.query_map([], |row| {
                Ok(District {
                    id: row.get(0)?,
                    base_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?;
            rows.collect()
        })
    }

    /// Council named `name` within `district_id`.
    pub fn council_id(&self, name: &str, district_id: i64) -> Result<Option<i64>> {
        self.query(|conn| {
            conn.query_row(
                "SELECT id FROM councils WHERE name = ?1 AND district_id = ?2",
                params![name, district_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn insert_council(&self, base_id: i64, name: &str, district_id: i64) -> Result<bool> {
        self.query(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO councils (base_id, name, district_id) VALUES (?1, ?2, ?3)",
                params![base_id, name, district_id],
            )
        })
        .map(|n| n > 0)
    }

    pub fn council_count(&self) -> Result<i64> {
        self.query(|conn| conn.query_row("SELECT COUNT(*) FROM councils", [], |row| row.get(0)))
    }

    /// Category with CPV code `code` (e.g. `45233140-2`).
    pub fn category_id(&self, code: &str) -> Result<Option<i64>> {
        self.query(|conn| {
            conn.query_row("SELECT id FROM categories WHERE code = ?1", params![code], |row| row.get(0))
                .optional()
        })
    }

    /// Insert a category if its code is new; returns its id either way.
    pub fn insert_category(&self, code: &str, description_pt: &str, description_en: &str) -> Result<i64> {
        self.query(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO categories (code, description_pt, description_en)
                 VALUES (?1, ?2, ?3)",
                params![code, description_pt, description_en],
            )?;
            conn.query_row("SELECT id FROM categories WHERE code = ?1", params![code], |row| row.get(0))
        })
    }

    /// Map ExternalIDs of entities to local ids, for those stored.
    pub fn entity_ids_by_base(&self, base_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        self.query(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM entities WHERE base_id = ?1")?;
            let mut found = HashMap::with_capacity(base_ids.len());
            for &base_id in base_ids {
                if let Some(id) = stmt.query_row(params![base_id], |row| row.get(0)).optional()? {
                    found.insert(base_id, id);
                }
            }
            Ok(found)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_lookup_skips_existing() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.insert_lookup(LookupTable::ContractType, 5, "Empreitadas de obras públicas").unwrap());
        assert!(!store.insert_lookup(LookupTable::ContractType, 5, "renamed").unwrap());

        let id = store
            .lookup_id(LookupTable::ContractType, "Empreitadas de obras públicas")
            .unwrap();
        assert!(id.is_some());
        assert_eq!(store.lookup_id(LookupTable::ContractType, "renamed").unwrap(), None);
        assert_eq!(store.lookup_count(LookupTable::ContractType).unwrap(), 1);
        assert_eq!(store.lookup_count(LookupTable::ActType).unwrap(), 0);
    }

    #[test]
    fn test_geography_is_scoped_by_parent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_country("Portugal").unwrap();
        let portugal = store.country_id("Portugal").unwrap().unwrap();

        store.insert_district(8, "Faro", portugal).unwrap();
        let faro = store.district_id("Faro", portugal).unwrap().unwrap();
        assert_eq!(store.district_id("Faro", portugal + 1).unwrap(), None);

        store.insert_council(801, "Albufeira", faro).unwrap();
        assert!(store.council_id("Albufeira", faro).unwrap().is_some());
        assert_eq!(store.council_id("Albufeira", faro + 1).unwrap(), None);

        let districts = store.districts().unwrap();
        assert_eq!(districts.len(), 1);
        assert_eq!(districts[0].base_id, 8);
    }

    #[test]
    fn test_insert_category_returns_existing_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.insert_category("45233140-2", "Obras rodoviárias", "Roadworks").unwrap();
        let second = store.insert_category("45233140-2", "", "").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.category_id("45233140-2").unwrap(), Some(first));
    }
}
