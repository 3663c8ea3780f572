//! Contract/tender ↔ entity associations and the invalidation hook.
//!
//! Every mutation of a join table goes through this module, and each one
//! marks the aggregates of the touched entities stale on the same
//! connection (and therefore inside the caller's transaction).

use std::collections::BTreeSet;

use rusqlite::{Connection, OptionalExtension, params};

use super::SqliteStore;
use crate::error::Result;
use crate::models::RecordKind;

/// Side of a contract an entity is associated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyRole {
    /// The buyer; its aggregate's `total_expended` counts the price.
    Contractor,
    /// The supplier; its aggregate's `total_earned` counts the price.
    Contracted,
}

impl PartyRole {
    pub(super) fn contract_table(self) -> &'static str {
        match self {
            PartyRole::Contractor => "contract_contractors",
            PartyRole::Contracted => "contract_contracted",
        }
    }
}

/// Join table and owner column for an association of `kind`.
pub(super) fn join_table(kind: RecordKind, role: PartyRole) -> (&'static str, &'static str) {
    match kind {
        RecordKind::Tender => ("tender_contractors", "tender_id"),
        _ => (role.contract_table(), "contract_id"),
    }
}

/// Entity ids currently associated with `owner_id` in `table`.
pub(super) fn party_ids(
    conn: &Connection,
    table: &str,
    owner_col: &str,
    owner_id: i64,
) -> rusqlite::Result<Vec<i64>> {
    let sql = format!("SELECT entity_id FROM {table} WHERE {owner_col} = ?1 ORDER BY entity_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner_id], |row| row.get(0))?;
    rows.collect()
}

/// Clear the association set of `owner_id` and re-add `entity_ids`.
///
/// Entities on either side of the change are invalidated.
pub(super) fn replace_parties(
    conn: &Connection,
    kind: RecordKind,
    role: PartyRole,
    owner_id: i64,
    entity_ids: &[i64],
) -> rusqlite::Result<()> {
    let (table, owner_col) = join_table(kind, role);
    let previous = party_ids(conn, table, owner_col, owner_id)?;

    conn.execute(
        &format!("DELETE FROM {table} WHERE {owner_col} = ?1"),
        params![owner_id],
    )?;

    let mut insert = conn.prepare(&format!(
        "INSERT OR IGNORE INTO {table} ({owner_col}, entity_id) VALUES (?1, ?2)"
    ))?;
    for entity_id in entity_ids {
        insert.execute(params![owner_id, entity_id])?;
    }

    let touched: BTreeSet<i64> = previous.into_iter().chain(entity_ids.iter().copied()).collect();
    invalidate_entities(conn, touched)?;
    Ok(())
}

/// Mark the aggregates of `entity_ids` stale, creating them if missing.
pub(super) fn invalidate_entities(
    conn: &Connection,
    entity_ids: impl IntoIterator<Item = i64>,
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO entity_data (entity_id, total_earned, total_expended, last_activity, is_fresh)
         VALUES (?1, 0, 0, NULL, 0)
         ON CONFLICT(entity_id) DO UPDATE SET is_fresh = 0",
    )?;
    let mut count = 0;
    for entity_id in entity_ids {
        count += stmt.execute(params![entity_id])?;
    }
    Ok(count)
}

impl SqliteStore {
    /// Associate one entity with a contract outside a full record upsert.
    ///
    /// Returns whether the association was new. Both ids are ExternalIDs.
    pub fn add_contract_party(
        &self,
        contract_base_id: i64,
        entity_base_id: i64,
        role: PartyRole,
    ) -> Result<bool> {
        self.change_contract_party(contract_base_id, entity_base_id, role, true)
    }

    /// Drop one contract association. Returns whether it existed.
    pub fn remove_contract_party(
        &self,
        contract_base_id: i64,
        entity_base_id: i64,
        role: PartyRole,
    ) -> Result<bool> {
        self.change_contract_party(contract_base_id, entity_base_id, role, false)
    }

    fn change_contract_party(
        &self,
        contract_base_id: i64,
        entity_base_id: i64,
        role: PartyRole,
        add: bool,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let ids = tx
            .query_row(
                "SELECT c.id, e.id FROM contracts c, entities e
                 WHERE c.base_id = ?1 AND e.base_id = ?2",
                params![contract_base_id, entity_base_id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        let Some((contract_id, entity_id)) = ids else {
            return Ok(false);
        };

        let table = role.contract_table();
        let changed = if add {
            tx.execute(
                &format!("INSERT OR IGNORE INTO {table} (contract_id, entity_id) VALUES (?1, ?2)"),
                params![contract_id, entity_id],
            )?
        } else {
            tx.execute(
                &format!("DELETE FROM {table} WHERE contract_id = ?1 AND entity_id = ?2"),
                params![contract_id, entity_id],
            )?
        };

        if changed > 0 {
            invalidate_entities(&tx, [entity_id])?;
        }
        tx.commit()?;
        Ok(changed > 0)
    }
}
