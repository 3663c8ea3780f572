//! Record validation and cleaning.
//!
//! One validator per record kind turns a raw upstream document into a
//! [`CleanedRecord`] with resolved local foreign keys. Every failing field is
//! collected into a single [`ValidationError`].
//!
//! Contracts and tenders reference entities by ExternalID. Unknown entities
//! are fetched (snapshot-first) and created inline, all or nothing.

mod contract;
mod entity;
pub mod fields;
mod tender;

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{AppError, FieldError, Result, ValidationError};
use crate::models::{CleanedRecord, RecordKind};
use crate::services::source::RecordSource;
use crate::storage::{LookupTable, SqliteStore};

pub use fields::{clean_cpvs, clean_place, clean_price};

/// Accumulates field failures for one record.
pub(crate) struct FieldErrors {
    kind: RecordKind,
    base_id: i64,
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub(crate) fn new(kind: RecordKind, base_id: i64) -> Self {
        Self {
            kind,
            base_id,
            errors: Vec::new(),
        }
    }

    /// Keep the value, or record the failure and fall back to the default.
    pub(crate) fn take<T: Default>(&mut self, field: &str, result: std::result::Result<T, String>) -> T {
        match result {
            Ok(value) => value,
            Err(message) => {
                self.errors.push(FieldError::new(field, message));
                T::default()
            }
        }
    }

    pub(crate) fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub(crate) fn finish(self) -> std::result::Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                kind: self.kind,
                base_id: self.base_id,
                fields: self.errors,
            })
        }
    }
}

/// Validates raw documents against the lookup tables of a store.
pub struct Validator<'a> {
    store: &'a SqliteStore,
    source: &'a RecordSource,
}

impl<'a> Validator<'a> {
    pub fn new(store: &'a SqliteStore, source: &'a RecordSource) -> Self {
        Self { store, source }
    }

    /// Clean a raw document of `kind`.
    ///
    /// Field failures are `AppError::Validation`; storage failures while
    /// resolving lookups propagate as they are.
    pub async fn clean(&self, kind: RecordKind, raw: &Value) -> Result<CleanedRecord> {
        let record = match kind {
            RecordKind::Entity => CleanedRecord::Entity(entity::clean(self.store, raw)?),
            RecordKind::Contract => CleanedRecord::Contract(contract::clean(self, raw).await?),
            RecordKind::Tender => CleanedRecord::Tender(tender::clean(self, raw).await?),
        };
        Ok(record)
    }

    /// Optional lookup by name; an unknown name is a field failure.
    pub(crate) fn lookup(&self, table: LookupTable, name: Option<&str>) -> Result<std::result::Result<Option<i64>, String>> {
        let Some(name) = name else {
            return Ok(Ok(None));
        };
        Ok(self
            .store
            .lookup_id(table, name)?
            .map(Some)
            .ok_or_else(|| format!("unknown value '{name}'")))
    }

    /// Category of a CPV code; unknown codes are not an error.
    pub(crate) fn category(&self, cpvs: Option<&str>) -> Result<Option<i64>> {
        match cpvs {
            Some(code) => self.store.category_id(code),
            None => Ok(None),
        }
    }

    /// Local ids of the entities referenced by `raw[key]` (`[{"id": ..}, ..]`).
    ///
    /// Missing entities are fetched and created only if every one of them
    /// can be; otherwise nothing is created and the field fails.
    pub(crate) async fn resolve_entities(
        &self,
        raw: &Value,
        key: &str,
    ) -> Result<std::result::Result<Vec<i64>, String>> {
        let base_ids = match entity_refs(raw, key) {
            Ok(ids) if ids.is_empty() => return Ok(Err("at least one entity is required".to_string())),
            Ok(ids) => ids,
            Err(message) => return Ok(Err(message)),
        };

        let mut known = self.store.entity_ids_by_base(&base_ids)?;
        let missing: Vec<i64> = base_ids
            .iter()
            .copied()
            .filter(|id| !known.contains_key(id))
            .collect();

        if !missing.is_empty() {
            let mut fetched = Vec::with_capacity(missing.len());
            for &base_id in &missing {
                let raw_entity = match self.source.get_cached_or_fetch(RecordKind::Entity, base_id, false).await {
                    Ok(value) => value,
                    Err(e) if e.is_recoverable() => {
                        return Ok(Err(format!("entity {base_id} could not be fetched: {e}")));
                    }
                    Err(e) => return Err(e),
                };
                match entity::clean(self.store, &raw_entity) {
                    Ok(record) => fetched.push(record),
                    Err(AppError::Validation(e)) => {
                        return Ok(Err(format!("entity {base_id} is invalid: {e}")));
                    }
                    Err(e) => return Err(e),
                }
            }

            for record in &fetched {
                let upserted = self.store.upsert_entity(record)?;
                log::info!("Created entity {} while resolving '{}'", record.base_id, key);
                known.insert(record.base_id, upserted.id);
            }
        }

        let mut ids = Vec::with_capacity(base_ids.len());
        for base_id in base_ids {
            if let Some(id) = known.get(&base_id) {
                ids.push(*id);
            }
        }
        Ok(Ok(ids))
    }
}

/// Distinct ExternalIDs of an entity reference list, in order.
fn entity_refs(raw: &Value, key: &str) -> std::result::Result<Vec<i64>, String> {
    let Some(items) = raw.get(key).and_then(Value::as_array) else {
        return Err("missing entity list".to_string());
    };
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        let id = fields::int_field(item, "id")?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// ExternalID of a raw document, as a validation failure if unusable.
pub(crate) fn record_id(kind: RecordKind, raw: &Value) -> std::result::Result<i64, ValidationError> {
    fields::int_field(raw, "id").map_err(|message| ValidationError {
        kind,
        base_id: 0,
        fields: vec![FieldError::new("id", message)],
    })
}
