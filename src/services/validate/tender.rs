use serde_json::Value;

use super::fields::{
    clean_cpvs, clean_date, clean_price, contract_type_name, deadline_days, defined, dre_document,
    int_field, str_field,
};
use super::{FieldErrors, Validator, record_id};
use crate::error::Result;
use crate::models::{RecordKind, TenderRecord};
use crate::storage::LookupTable;

pub(super) async fn clean(validator: &Validator<'_>, raw: &Value) -> Result<TenderRecord> {
    let base_id = record_id(RecordKind::Tender, raw)?;
    let mut errors = FieldErrors::new(RecordKind::Tender, base_id);

    let price = errors.take(
        "basePrice",
        defined(raw, "basePrice").map(clean_price).transpose(),
    );

    let publication_date = errors.take(
        "drPublicationDate",
        clean_date(str_field(raw, "drPublicationDate"))
            .and_then(|date| date.ok_or_else(|| "missing".to_string())),
    );
    let deadline_date = errors.take(
        "proposalDeadline",
        deadline_days(str_field(raw, "proposalDeadline")).and_then(|days| {
            publication_date
                .checked_add_signed(days)
                .ok_or_else(|| "deadline is out of range".to_string())
        }),
    );

    let cpvs = errors.take("cpvs", clean_cpvs(str_field(raw, "cpvs").unwrap_or("")));
    let category_id = validator.category(cpvs.as_deref())?;

    let act_type_id = errors.take("type", validator.lookup(LookupTable::ActType, defined(raw, "type"))?);
    let model_type_id = errors.take(
        "modelType",
        validator.lookup(LookupTable::ModelType, defined(raw, "modelType"))?,
    );
    let type_name = str_field(raw, "contractType").and_then(contract_type_name);
    let contract_type_id = errors.take(
        "contractType",
        validator.lookup(LookupTable::ContractType, type_name.as_deref())?,
    );

    let dre_document = errors.take(
        "reference",
        str_field(raw, "reference")
            .ok_or_else(|| "missing".to_string())
            .and_then(dre_document),
    );
    let dre_number = errors.take("dreNumber", int_field(raw, "dreNumber"));
    let dre_series = errors.take("dreSeries", int_field(raw, "dreSeries"));

    let contractors = errors.take(
        "contractingEntities",
        validator.resolve_entities(raw, "contractingEntities").await?,
    );

    errors.finish()?;
    Ok(TenderRecord {
        base_id,
        description: str_field(raw, "contractDesignation").map(str::to_string),
        act_type_id,
        model_type_id,
        contract_type_id,
        announcement_number: str_field(raw, "announcementNumber").map(str::to_string),
        publication_date,
        deadline_date,
        cpvs,
        category_id,
        price,
        dre_number,
        dre_series,
        dre_document,
        contractors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::testing::{FakeUpstream, context, entity_json, seed_lookups, tender_json};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clean_tender() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 1, entity_json(1, "Município de Loulé"));
        let ctx = context(&tmp, upstream);
        seed_lookups(&ctx.store);
        let source = ctx.source();
        let validator = Validator::new(&ctx.store, &source);

        let record = clean(&validator, &tender_json(880, &[1])).await.unwrap();

        assert_eq!(record.base_id, 880);
        assert_eq!(record.price, Some(25_000_000));
        assert_eq!(record.publication_date, NaiveDate::from_ymd_opt(2014, 1, 10).unwrap());
        assert_eq!(record.deadline_date, NaiveDate::from_ymd_opt(2014, 1, 30).unwrap());
        assert_eq!(record.dre_document, 5621834);
        assert_eq!((record.dre_number, record.dre_series), (7, 2));
        assert_eq!(record.category_id, None);
        assert!(record.act_type_id.is_some() && record.model_type_id.is_some());
        assert_eq!(record.contractors.len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_without_days_is_publication_date() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 1, entity_json(1, "a"));
        let ctx = context(&tmp, upstream);
        seed_lookups(&ctx.store);
        let source = ctx.source();
        let validator = Validator::new(&ctx.store, &source);

        let mut raw = tender_json(881, &[1]);
        raw["proposalDeadline"] = "Ver peças do procedimento".into();
        raw["basePrice"] = Value::Null;
        let record = clean(&validator, &raw).await.unwrap();

        assert_eq!(record.deadline_date, record.publication_date);
        assert_eq!(record.price, None);
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline_is_a_field_failure() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 1, entity_json(1, "a"));
        let ctx = context(&tmp, upstream);
        seed_lookups(&ctx.store);
        let source = ctx.source();
        let validator = Validator::new(&ctx.store, &source);

        // Too many days for chrono, and a valid span past the last date.
        for deadline in ["200000000000000 dias.", "2000000000 dias."] {
            let mut raw = tender_json(882, &[1]);
            raw["proposalDeadline"] = deadline.into();
            match clean(&validator, &raw).await {
                Err(AppError::Validation(e)) => assert!(e.has_field("proposalDeadline")),
                other => panic!("expected a validation error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_tender_reports_fields() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 1, entity_json(1, "a"));
        let ctx = context(&tmp, upstream);
        seed_lookups(&ctx.store);
        let source = ctx.source();
        let validator = Validator::new(&ctx.store, &source);

        let mut raw = tender_json(882, &[1]);
        raw["drPublicationDate"] = "".into();
        raw["type"] = "Aviso de prorrogação".into();
        raw["reference"] = "https://dre.pt/".into();
        let AppError::Validation(err) = clean(&validator, &raw).await.unwrap_err() else {
            panic!("expected a validation error");
        };

        assert!(err.has_field("drPublicationDate"));
        assert!(err.has_field("type"));
        assert!(err.has_field("reference"));
        assert!(!err.has_field("contractingEntities"));
    }
}
