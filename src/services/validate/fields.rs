//! Pure field cleaners for upstream JSON.
//!
//! Each returns the cleaned value or a human-readable message; the record
//! validators attach the field name.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde_json::Value;

/// Upstream placeholder for "no value".
pub const NOT_DEFINED: &str = "Não definido.";

static PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d{3})*,\d{2}$").expect("price pattern compiles"));
static CPV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{8}-\d)(\s*,.*)?$").expect("CPV pattern compiles"));

/// String field, `None` when absent, null or blank.
pub fn str_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Integer field given either as a JSON number or a numeric string.
pub fn int_field(raw: &Value, key: &str) -> Result<i64, String> {
    match raw.get(key) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| format!("'{n}' is not an integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| format!("'{s}' is not an integer")),
        Some(Value::Null) | None => Err("missing".to_string()),
        Some(other) => Err(format!("unexpected value {other}")),
    }
}

/// String field that is absent, blank or the placeholder.
pub fn defined<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    str_field(raw, key).filter(|s| *s != NOT_DEFINED)
}

/// Price in cents from e.g. `"1.000.234,00 €"`.
///
/// Only the first whitespace-separated token is read; `.` separates
/// thousands and `,` the two decimal digits.
pub fn clean_price(value: &str) -> Result<i64, String> {
    let token = value.split_whitespace().next().unwrap_or("");
    if !PRICE.is_match(token) {
        return Err(format!("'{value}' is not a price"));
    }
    token
        .replace(['.', ','], "")
        .parse()
        .map_err(|_| format!("'{value}' is out of range"))
}

/// `(country, district, council)` of the first place in an execution place
/// list such as `"Portugal, Faro, Loulé<BR/>Portugal"`.
pub fn clean_place(value: &str) -> (Option<String>, Option<String>, Option<String>) {
    let first = value.split("<BR/>").next().unwrap_or("");
    let mut parts = first.split(", ").map(|part| {
        let part = part.trim();
        if part.is_empty() || part.contains("não determinad") {
            None
        } else {
            Some(part.to_string())
        }
    });
    (
        parts.next().flatten(),
        parts.next().flatten(),
        parts.next().flatten(),
    )
}

/// CPV code from `"79822500-7, Serviços de concepção gráfica"`.
pub fn clean_cpvs(value: &str) -> Result<Option<String>, String> {
    let value = value.trim();
    if value.is_empty() || value == NOT_DEFINED {
        return Ok(None);
    }
    CPV.captures(value)
        .and_then(|caps| caps.get(1))
        .map(|code| Some(code.as_str().to_string()))
        .ok_or_else(|| format!("'{value}' is not a CPV code"))
}

/// Canonical contract type name, `None` when undefined.
///
/// Multi-valued fields keep the first value, and every "Outros Tipos (...)"
/// variant collapses into "Outros".
pub fn contract_type_name(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == NOT_DEFINED {
        return None;
    }
    let first = if value.contains("<br/>") {
        value.split("<br/>").next()
    } else {
        value.split("; ").next()
    }
    .unwrap_or(value)
    .trim();

    if first.starts_with("Outros Tipos") {
        Some("Outros".to_string())
    } else {
        Some(first.to_string())
    }
}

/// `dd-mm-YYYY`; blank is `None`.
pub fn clean_date(value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%d-%m-%Y")
            .map(Some)
            .map_err(|_| format!("'{v}' is not a dd-mm-YYYY date")),
    }
}

/// Days in a `"N dias."` deadline; anything else is zero.
///
/// A day count chrono cannot represent is a failure.
pub fn deadline_days(value: Option<&str>) -> Result<Duration, String> {
    let Some(value) = value else {
        return Ok(Duration::zero());
    };
    let mut words = value.split_whitespace();
    match (words.next().map(str::parse::<i64>), words.next()) {
        (Some(Ok(days)), Some("dias.")) => {
            Duration::try_days(days).ok_or_else(|| format!("'{value}' is out of range"))
        }
        _ => Ok(Duration::zero()),
    }
}

/// Integer after the last `=` of a DRE document URL.
pub fn dre_document(value: &str) -> Result<i64, String> {
    value
        .rsplit('=')
        .next()
        .and_then(|id| id.trim().parse().ok())
        .ok_or_else(|| format!("'{value}' has no document number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_price() {
        assert_eq!(clean_price("10,34 €"), Ok(1034));
        assert_eq!(clean_price("10,00 €"), Ok(1000));
        assert_eq!(clean_price("1.000,00 €"), Ok(100000));
        assert_eq!(clean_price("1.000.234,00 €"), Ok(100023400));
        assert!(clean_price("10€").is_err());
        assert!(clean_price("").is_err());
    }

    #[test]
    fn test_place_takes_first_block() {
        let value = "Portugal, Porto, Maia<BR/>Portugal<BR/>Portugal, Distrito não determinado, \
                     Concelho não determinado<BR/>Portugal, Vila Real, Vila Real";
        assert_eq!(
            clean_place(value),
            (Some("Portugal".into()), Some("Porto".into()), Some("Maia".into()))
        );
    }

    #[test]
    fn test_place_pads_missing_parts() {
        assert_eq!(
            clean_place("Portugal, Porto"),
            (Some("Portugal".into()), Some("Porto".into()), None)
        );
        assert_eq!(
            clean_place("Portugal, Porto<BR/>Portugal"),
            (Some("Portugal".into()), Some("Porto".into()), None)
        );
    }

    #[test]
    fn test_place_undetermined_parts_are_none() {
        assert_eq!(
            clean_place("Portugal, Distrito não determinado, Concelho não determinado"),
            (Some("Portugal".into()), None, None)
        );
    }

    #[test]
    fn test_cpvs() {
        assert_eq!(
            clean_cpvs("79822500-7, Serviços de concepção gráfica"),
            Ok(Some("79822500-7".into()))
        );
        assert_eq!(clean_cpvs("45233140-2"), Ok(Some("45233140-2".into())));
        assert_eq!(clean_cpvs(NOT_DEFINED), Ok(None));
        assert!(clean_cpvs("7982-7, x").is_err());
    }

    #[test]
    fn test_contract_type_name() {
        assert_eq!(contract_type_name(NOT_DEFINED), None);
        assert_eq!(
            contract_type_name("Outros Tipos (Não Preenchido)"),
            Some("Outros".into())
        );
        assert_eq!(
            contract_type_name("Aquisição de bens móveis<br/>Aquisição de serviços"),
            Some("Aquisição de bens móveis".into())
        );
        assert_eq!(
            contract_type_name("Locação de bens móveis; Aquisição de serviços"),
            Some("Locação de bens móveis".into())
        );
    }

    #[test]
    fn test_dates_and_deadlines() {
        assert_eq!(
            clean_date(Some("30-04-2013")),
            Ok(NaiveDate::from_ymd_opt(2013, 4, 30))
        );
        assert_eq!(clean_date(Some("")), Ok(None));
        assert!(clean_date(Some("2013-04-30")).is_err());

        assert_eq!(deadline_days(Some("20 dias.")), Ok(Duration::days(20)));
        assert_eq!(deadline_days(Some("Ver anúncio")), Ok(Duration::zero()));
        assert_eq!(deadline_days(None), Ok(Duration::zero()));
    }

    #[test]
    fn test_deadline_out_of_range_is_an_error() {
        assert!(deadline_days(Some("200000000000000 dias.")).is_err());
        assert!(deadline_days(Some("-200000000000000 dias.")).is_err());
    }

    #[test]
    fn test_patterns_compile() {
        assert!(PRICE.is_match("0,01"));
        assert!(CPV.is_match("45233140-2"));
    }

    #[test]
    fn test_dre_document_and_int_field() {
        assert_eq!(
            dre_document("https://dre.pt/application/external/eurolex?docid=5621834"),
            Ok(5621834)
        );
        assert!(dre_document("https://dre.pt/").is_err());

        let raw = json!({"a": "7", "b": 2, "c": "x"});
        assert_eq!(int_field(&raw, "a"), Ok(7));
        assert_eq!(int_field(&raw, "b"), Ok(2));
        assert!(int_field(&raw, "c").is_err());
        assert_eq!(int_field(&raw, "d"), Err("missing".to_string()));
    }
}
