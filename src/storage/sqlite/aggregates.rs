//! Derived aggregate queries.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};

use super::SqliteStore;
use crate::error::Result;
use crate::models::{CategoryAggregate, EntityAggregate};

fn price_sum(conn: &Connection, table: &str, entity_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(c.price), 0) FROM contracts c
             JOIN {table} p ON p.contract_id = c.id
             WHERE p.entity_id = ?1"
        ),
        params![entity_id],
        |row| row.get(0),
    )
}

fn compute_entity_aggregate(conn: &Connection, entity_id: i64) -> rusqlite::Result<EntityAggregate> {
    let total_earned = price_sum(conn, "contract_contracted", entity_id)?;
    let total_expended = price_sum(conn, "contract_contractors", entity_id)?;
    let last_activity: Option<NaiveDate> = conn.query_row(
        "SELECT MAX(c.signing_date) FROM contracts c
         WHERE c.id IN (SELECT contract_id FROM contract_contracted WHERE entity_id = ?1)
            OR c.id IN (SELECT contract_id FROM contract_contractors WHERE entity_id = ?1)",
        params![entity_id],
        |row| row.get(0),
    )?;

    Ok(EntityAggregate {
        entity_id,
        total_earned,
        total_expended,
        last_activity,
        is_fresh: true,
    })
}

impl SqliteStore {
    /// Stored aggregate of an entity, `None` if never computed or invalidated.
    pub fn entity_aggregate(&self, entity_id: i64) -> Result<Option<EntityAggregate>> {
        self.query(|conn| {
            conn.query_row(
                "SELECT entity_id, total_earned, total_expended, last_activity, is_fresh
                 FROM entity_data WHERE entity_id = ?1",
                params![entity_id],
                |row| {
                    Ok(EntityAggregate {
                        entity_id: row.get(0)?,
                        total_earned: row.get(1)?,
                        total_expended: row.get(2)?,
                        last_activity: row.get(3)?,
                        is_fresh: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Recompute an entity's aggregate from its current associations and
    /// store it as fresh.
    ///
    /// Compute and save share a transaction so an association change cannot
    /// slip in between and be masked by the fresh flag.
    pub fn refresh_entity_aggregate(&self, entity_id: i64) -> Result<EntityAggregate> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let aggregate = compute_entity_aggregate(&tx, entity_id)?;
        tx.execute(
            "INSERT INTO entity_data (entity_id, total_earned, total_expended, last_activity, is_fresh)
             VALUES (?1, ?2, ?3, ?4, 1)
             ON CONFLICT(entity_id) DO UPDATE SET
                total_earned = excluded.total_earned,
                total_expended = excluded.total_expended,
                last_activity = excluded.last_activity,
                is_fresh = 1",
            params![
                aggregate.entity_id,
                aggregate.total_earned,
                aggregate.total_expended,
                aggregate.last_activity,
            ],
        )?;

        tx.commit()?;
        Ok(aggregate)
    }

    /// Local ids of every contract the entity takes part in, newest signing first.
    pub fn entity_contract_ids(&self, entity_id: i64) -> Result<Vec<i64>> {
        self.query(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id FROM contracts c
                 WHERE c.id IN (SELECT contract_id FROM contract_contracted WHERE entity_id = ?1)
                    OR c.id IN (SELECT contract_id FROM contract_contractors WHERE entity_id = ?1)
                 ORDER BY c.signing_date DESC, c.id DESC",
            )?;
            let rows = stmt.query_map(params![entity_id], |row| row.get(0))?;
            rows.collect()
        })
    }

    /// Local entity ids, optionally only those whose aggregate is missing or stale.
    pub fn entity_ids(&self, stale_only: bool) -> Result<Vec<i64>> {
        let sql = if stale_only {
            "SELECT e.id FROM entities e
             LEFT JOIN entity_data d ON d.entity_id = e.id
             WHERE d.entity_id IS NULL OR d.is_fresh = 0
             ORDER BY e.id"
        } else {
            "SELECT id FROM entities ORDER BY id"
        };
        self.query(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
    }

    /// `(id, code)` of every category.
    pub fn categories(&self) -> Result<Vec<(i64, String)>> {
        self.query(|conn| {
            let mut stmt = conn.prepare("SELECT id, code FROM categories ORDER BY code")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
    }

    /// Count and price sum of contracts classified directly under a category.
    pub fn category_aggregate(&self, category_id: i64) -> Result<CategoryAggregate> {
        self.query(|conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(price), 0) FROM contracts WHERE category_id = ?1",
                params![category_id],
                |row| {
                    Ok(CategoryAggregate {
                        count: row.get(0)?,
                        price_sum: row.get(1)?,
                    })
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn test_refresh_sums_each_side() {
        let store = SqliteStore::open_in_memory().unwrap();
        let buyer = entity(&store, 1, "Município");
        let supplier = entity(&store, 2, "Empresa");

        let mut first = contract(10, 100, vec![buyer], vec![supplier]);
        first.signing_date = Some(date(2012, 3, 4));
        let mut second = contract(11, 250, vec![buyer], vec![]);
        second.signing_date = Some(date(2013, 1, 2));
        store.upsert_contract(&first).unwrap();
        store.upsert_contract(&second).unwrap();

        let buyer_aggregate = store.refresh_entity_aggregate(buyer).unwrap();
        assert_eq!(buyer_aggregate.total_expended, 350);
        assert_eq!(buyer_aggregate.total_earned, 0);
        assert_eq!(buyer_aggregate.last_activity, Some(date(2013, 1, 2)));
        assert!(buyer_aggregate.is_fresh);

        let supplier_aggregate = store.refresh_entity_aggregate(supplier).unwrap();
        assert_eq!(supplier_aggregate.total_earned, 100);
        assert_eq!(supplier_aggregate.total_expended, 0);
        assert_eq!(supplier_aggregate.last_activity, Some(date(2012, 3, 4)));

        assert_eq!(store.entity_aggregate(buyer).unwrap(), Some(buyer_aggregate));
    }

    #[test]
    fn test_entity_without_contracts_has_zero_totals() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = entity(&store, 1, "a");

        let aggregate = store.refresh_entity_aggregate(id).unwrap();
        assert_eq!(aggregate.total_earned, 0);
        assert_eq!(aggregate.total_expended, 0);
        assert_eq!(aggregate.last_activity, None);
    }

    #[test]
    fn test_stale_listing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = entity(&store, 1, "a");
        let b = entity(&store, 2, "b");
        assert_eq!(store.entity_ids(true).unwrap(), vec![a, b]);

        store.refresh_entity_aggregate(a).unwrap();
        assert_eq!(store.entity_ids(true).unwrap(), vec![b]);
        assert_eq!(store.entity_ids(false).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_contract_ids_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = entity(&store, 1, "a");
        let mut old = contract(10, 1, vec![a], vec![]);
        old.signing_date = Some(date(2010, 1, 1));
        let mut new = contract(11, 1, vec![], vec![a]);
        new.signing_date = Some(date(2014, 1, 1));
        let old_id = store.upsert_contract(&old).unwrap().id;
        let new_id = store.upsert_contract(&new).unwrap().id;

        assert_eq!(store.entity_contract_ids(a).unwrap(), vec![new_id, old_id]);
    }

    #[test]
    fn test_category_aggregate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let category = store.insert_category("45000000-7", "Obras", "Works").unwrap();
        let mut c = contract(10, 300, vec![], vec![]);
        c.category_id = Some(category);
        store.upsert_contract(&c).unwrap();
        store.upsert_contract(&contract(11, 50, vec![], vec![])).unwrap();

        let aggregate = store.category_aggregate(category).unwrap();
        assert_eq!(aggregate, CategoryAggregate { count: 1, price_sum: 300 });
    }
}
