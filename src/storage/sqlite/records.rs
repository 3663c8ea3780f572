//! Insert-or-update and delete of synchronized records.

use rusqlite::{Connection, OptionalExtension, params};

use super::SqliteStore;
use super::associations::{PartyRole, invalidate_entities, join_table, party_ids, replace_parties};
use crate::error::Result;
use crate::models::{CleanedRecord, ContractRecord, EntityRecord, RecordKind, TenderRecord, Upserted};

fn existing_id(conn: &Connection, kind: RecordKind, base_id: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        &format!("SELECT id FROM {} WHERE base_id = ?1", kind.table()),
        params![base_id],
        |row| row.get(0),
    )
    .optional()
}

impl SqliteStore {
    /// Persist a validated record of any kind.
    pub fn upsert(&self, record: &CleanedRecord) -> Result<Upserted> {
        match record {
            CleanedRecord::Entity(r) => self.upsert_entity(r),
            CleanedRecord::Contract(r) => self.upsert_contract(r),
            CleanedRecord::Tender(r) => self.upsert_tender(r),
        }
    }

    pub fn upsert_entity(&self, record: &EntityRecord) -> Result<Upserted> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let (id, created) = match existing_id(&tx, RecordKind::Entity, record.base_id)? {
            Some(id) => {
                tx.execute(
                    "UPDATE entities SET name = ?2, nif = ?3, country_id = ?4 WHERE id = ?1",
                    params![id, record.name, record.nif, record.country_id],
                )?;
                (id, false)
            }
            None => {
                tx.execute(
                    "INSERT INTO entities (base_id, name, nif, country_id) VALUES (?1, ?2, ?3, ?4)",
                    params![record.base_id, record.name, record.nif, record.country_id],
                )?;
                (tx.last_insert_rowid(), true)
            }
        };

        tx.commit()?;
        Ok(Upserted {
            kind: RecordKind::Entity,
            id,
            base_id: record.base_id,
            created,
        })
    }

    /// Full overwrite of a contract, replacing both association sets.
    pub fn upsert_contract(&self, record: &ContractRecord) -> Result<Upserted> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing = existing_id(&tx, RecordKind::Contract, record.base_id)?;
        let values = params![
            record.base_id,
            record.added_date,
            record.signing_date,
            record.contract_type_id,
            record.procedure_type_id,
            record.description,
            record.contract_description,
            record.cpvs,
            record.category_id,
            record.price,
            record.country_id,
            record.district_id,
            record.council_id,
        ];
        let (id, created) = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE contracts SET base_id = ?1, added_date = ?2, signing_date = ?3,
                        contract_type_id = ?4, procedure_type_id = ?5, description = ?6,
                        contract_description = ?7, cpvs = ?8, category_id = ?9, price = ?10,
                        country_id = ?11, district_id = ?12, council_id = ?13
                     WHERE base_id = ?1",
                    values,
                )?;
                (id, false)
            }
            None => {
                tx.execute(
                    "INSERT INTO contracts (base_id, added_date, signing_date, contract_type_id,
                        procedure_type_id, description, contract_description, cpvs, category_id,
                        price, country_id, district_id, council_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    values,
                )?;
                (tx.last_insert_rowid(), true)
            }
        };

        replace_parties(&tx, RecordKind::Contract, PartyRole::Contractor, id, &record.contractors)?;
        replace_parties(&tx, RecordKind::Contract, PartyRole::Contracted, id, &record.contracted)?;

        tx.commit()?;
        Ok(Upserted {
            kind: RecordKind::Contract,
            id,
            base_id: record.base_id,
            created,
        })
    }

    /// Full overwrite of a tender, replacing its contractor set.
    pub fn upsert_tender(&self, record: &TenderRecord) -> Result<Upserted> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing = existing_id(&tx, RecordKind::Tender, record.base_id)?;
        let values = params![
            record.base_id,
            record.description,
            record.act_type_id,
            record.model_type_id,
            record.contract_type_id,
            record.announcement_number,
            record.publication_date,
            record.deadline_date,
            record.cpvs,
            record.category_id,
            record.price,
            record.dre_number,
            record.dre_series,
            record.dre_document,
        ];
        let (id, created) = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE tenders SET base_id = ?1, description = ?2, act_type_id = ?3,
                        model_type_id = ?4, contract_type_id = ?5, announcement_number = ?6,
                        publication_date = ?7, deadline_date = ?8, cpvs = ?9, category_id = ?10,
                        price = ?11, dre_number = ?12, dre_series = ?13, dre_document = ?14
                     WHERE base_id = ?1",
                    values,
                )?;
                (id, false)
            }
            None => {
                tx.execute(
                    "INSERT INTO tenders (base_id, description, act_type_id, model_type_id,
                        contract_type_id, announcement_number, publication_date, deadline_date,
                        cpvs, category_id, price, dre_number, dre_series, dre_document)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    values,
                )?;
                (tx.last_insert_rowid(), true)
            }
        };

        replace_parties(&tx, RecordKind::Tender, PartyRole::Contractor, id, &record.contractors)?;

        tx.commit()?;
        Ok(Upserted {
            kind: RecordKind::Tender,
            id,
            base_id: record.base_id,
            created,
        })
    }

    /// Delete the record with ExternalID `base_id` and its associations.
    ///
    /// Entities that lose an association are invalidated. Returns whether a
    /// record was deleted.
    pub fn delete_record(&self, kind: RecordKind, base_id: i64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let Some(id) = existing_id(&tx, kind, base_id)? else {
            return Ok(false);
        };

        match kind {
            RecordKind::Entity => {
                for table in ["contract_contractors", "contract_contracted", "tender_contractors"] {
                    tx.execute(
                        &format!("DELETE FROM {table} WHERE entity_id = ?1"),
                        params![id],
                    )?;
                }
                tx.execute("DELETE FROM entity_data WHERE entity_id = ?1", params![id])?;
            }
            RecordKind::Contract | RecordKind::Tender => {
                let roles: &[PartyRole] = match kind {
                    RecordKind::Contract => &[PartyRole::Contractor, PartyRole::Contracted],
                    _ => &[PartyRole::Contractor],
                };
                let mut touched = Vec::new();
                for role in roles {
                    let (table, owner_col) = join_table(kind, *role);
                    touched.extend(party_ids(&tx, table, owner_col, id)?);
                    tx.execute(
                        &format!("DELETE FROM {table} WHERE {owner_col} = ?1"),
                        params![id],
                    )?;
                }
                invalidate_entities(&tx, touched)?;
            }
        }

        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id],
        )?;
        tx.commit()?;
        Ok(true)
    }
}
