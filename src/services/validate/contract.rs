use serde_json::Value;

use super::fields::{
    clean_cpvs, clean_date, clean_place, clean_price, contract_type_name, defined, str_field,
};
use super::{FieldErrors, Validator, record_id};
use crate::error::Result;
use crate::models::{ContractRecord, RecordKind};
use crate::storage::LookupTable;

/// Resolved `(country, district, council)` ids of an execution place.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct Place {
    pub country_id: Option<i64>,
    pub district_id: Option<i64>,
    pub council_id: Option<i64>,
}

/// Each level must resolve within its parent.
pub(super) fn resolve_place(validator: &Validator<'_>, value: Option<&str>) -> Result<std::result::Result<Place, String>> {
    let Some(value) = value else {
        return Ok(Ok(Place::default()));
    };
    let (country, district, council) = clean_place(value);
    let store = validator.store;
    let mut place = Place::default();

    let Some(country) = country else {
        return Ok(Ok(place));
    };
    let Some(country_id) = store.country_id(&country)? else {
        return Ok(Err(format!("unknown country '{country}'")));
    };
    place.country_id = Some(country_id);

    let Some(district) = district else {
        return Ok(Ok(place));
    };
    let Some(district_id) = store.district_id(&district, country_id)? else {
        return Ok(Err(format!("unknown district '{district}' in {country}")));
    };
    place.district_id = Some(district_id);

    let Some(council) = council else {
        return Ok(Ok(place));
    };
    let Some(council_id) = store.council_id(&council, district_id)? else {
        return Ok(Err(format!("unknown council '{council}' in {district}")));
    };
    place.council_id = Some(council_id);
    Ok(Ok(place))
}

pub(super) async fn clean(validator: &Validator<'_>, raw: &Value) -> Result<ContractRecord> {
    let base_id = record_id(RecordKind::Contract, raw)?;
    let mut errors = FieldErrors::new(RecordKind::Contract, base_id);

    let price = errors.take(
        "initialContractualPrice",
        str_field(raw, "initialContractualPrice")
            .ok_or_else(|| "missing".to_string())
            .and_then(clean_price),
    );

    let added_date = errors.take(
        "publicationDate",
        clean_date(str_field(raw, "publicationDate"))
            .and_then(|date| date.ok_or_else(|| "missing".to_string())),
    );
    let signing_date = errors.take("signingDate", clean_date(str_field(raw, "signingDate")));

    let cpvs = errors.take("cpvs", clean_cpvs(str_field(raw, "cpvs").unwrap_or("")));
    let category_id = validator.category(cpvs.as_deref())?;

    let procedure_type_id = errors.take(
        "contractingProcedureType",
        validator.lookup(LookupTable::ProcedureType, defined(raw, "contractingProcedureType"))?,
    );
    let type_name = str_field(raw, "contractTypes").and_then(contract_type_name);
    let contract_type_id = errors.take(
        "contractTypes",
        validator.lookup(LookupTable::ContractType, type_name.as_deref())?,
    );

    let place = errors.take(
        "executionPlace",
        resolve_place(validator, str_field(raw, "executionPlace"))?,
    );

    let contractors = errors.take("contracting", validator.resolve_entities(raw, "contracting").await?);
    let contracted = errors.take("contracted", validator.resolve_entities(raw, "contracted").await?);

    errors.finish()?;
    Ok(ContractRecord {
        base_id,
        added_date,
        signing_date,
        contract_type_id,
        procedure_type_id,
        description: str_field(raw, "description").map(str::to_string),
        contract_description: str_field(raw, "objectBriefDescription")
            .unwrap_or_default()
            .to_string(),
        cpvs,
        category_id,
        price,
        country_id: place.country_id,
        district_id: place.district_id,
        council_id: place.council_id,
        contractors,
        contracted,
    })
}
