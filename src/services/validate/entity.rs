use serde_json::Value;

use super::fields::{defined, str_field};
use super::{FieldErrors, record_id};
use crate::error::Result;
use crate::models::{EntityRecord, RecordKind};
use crate::storage::SqliteStore;

/// `{"id", "description", "nif", "country"}` → [`EntityRecord`].
pub(super) fn clean(store: &SqliteStore, raw: &Value) -> Result<EntityRecord> {
    let base_id = record_id(RecordKind::Entity, raw)?;
    let mut errors = FieldErrors::new(RecordKind::Entity, base_id);

    let name = errors.take(
        "description",
        str_field(raw, "description")
            .map(str::to_string)
            .ok_or_else(|| "missing".to_string()),
    );

    let nif = match raw.get("nif") {
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => str_field(raw, "nif")
            .map(str::to_string)
            .ok_or_else(|| "missing".to_string()),
    };
    let nif = errors.take("nif", nif);

    let country_id = match defined(raw, "country") {
        Some(name) => {
            let found = store.country_id(name)?;
            errors.take(
                "country",
                found.map(Some).ok_or_else(|| format!("unknown country '{name}'")),
            )
        }
        None => None,
    };

    errors.finish()?;
    Ok(EntityRecord {
        base_id,
        name,
        nif,
        country_id,
    })
}
