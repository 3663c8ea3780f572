//! Built-in analyses over the contract store.
//!
//! Prices are stored in cents and reported in euros.

use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{Connection, params};
use serde_json::{Value, json};

use super::Analysis;
use crate::error::Result;
use crate::storage::SqliteStore;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Log2 price bins; 2^40 cents covers every contract seen upstream.
const PRICE_BINS: u32 = 40;

pub fn builtin() -> Vec<Analysis> {
    vec![
        Analysis::new("contracts_macro_statistics", DAY, |store| {
            macro_statistics(store, Utc::now().date_naive())
        }),
        Analysis::new("contracts_price_distribution", 7 * DAY, price_distribution),
        Analysis::new("contracts_time_series", DAY, contracts_time_series),
        Analysis::new("procedure_type_time_series", 7 * DAY, procedure_type_time_series),
        Analysis::new("entities_values_distribution", 30 * DAY, entities_values_distribution),
        Analysis::new("municipalities_contracts_time_series", DAY, |store| {
            entities_contracts_time_series(store, "Município")
        }),
    ]
}

fn count_and_sum(conn: &Connection, filter: &str, args: &[&dyn rusqlite::ToSql]) -> rusqlite::Result<(i64, i64)> {
    conn.query_row(
        &format!("SELECT COUNT(price), COALESCE(SUM(price), 0) FROM contracts {filter}"),
        args,
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

/// Contract count and value overall, this year and this month.
pub fn macro_statistics(store: &SqliteStore, today: NaiveDate) -> Result<Value> {
    let year = format!("{:04}", today.year());
    let month = format!("{:04}-{:02}", today.year(), today.month());

    store.query(|conn| {
        let (total_count, total_sum) = count_and_sum(conn, "", &[])?;
        let (year_count, year_sum) = count_and_sum(
            conn,
            "WHERE strftime('%Y', signing_date) = ?1",
            &[&year],
        )?;
        let (month_count, month_sum) = count_and_sum(
            conn,
            "WHERE strftime('%Y-%m', signing_date) = ?1",
            &[&month],
        )?;
        Ok(json!({
            "total_count": total_count,
            "total_sum": total_sum,
            "year_count": year_count,
            "year_sum": year_sum,
            "month_count": month_count,
            "month_sum": month_sum,
        }))
    })
}

fn log2_histogram(conn: &Connection, sql: &str) -> rusqlite::Result<Value> {
    let mut stmt = conn.prepare(sql)?;
    let mut bins = Vec::with_capacity(PRICE_BINS as usize);
    for x in 0..PRICE_BINS {
        let low = 1_i64 << x;
        let high = 1_i64 << (x + 1);
        let count: i64 = stmt.query_row(params![low, high], |row| row.get(0))?;
        bins.push(json!([low as f64 / 100.0, count]));
    }
    Ok(Value::Array(bins))
}

/// Number of contracts per log2 price bin, as `[[euros, count], ...]`.
pub fn price_distribution(store: &SqliteStore) -> Result<Value> {
    store.query(|conn| {
        log2_histogram(
            conn,
            "SELECT COUNT(*) FROM contracts WHERE price >= ?1 AND price < ?2",
        )
    })
}

/// Number of entities per log2 bin of their earnings.
pub fn entities_values_distribution(store: &SqliteStore) -> Result<Value> {
    store.query(|conn| {
        log2_histogram(
            conn,
            "SELECT COUNT(*) FROM entity_data WHERE total_earned >= ?1 AND total_earned < ?2",
        )
    })
}

fn month_bounds(month: &str) -> Option<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").ok()?;
    let to = from.checked_add_months(chrono::Months::new(1))?;
    Some((from, to))
}

/// Monthly contract count and value by signing date.
pub fn contracts_time_series(store: &SqliteStore) -> Result<Value> {
    store.query(|conn| {
        let mut stmt = conn.prepare(
            "SELECT strftime('%Y-%m', signing_date) AS month, COUNT(*), COALESCE(SUM(price), 0)
             FROM contracts WHERE signing_date IS NOT NULL
             GROUP BY month ORDER BY month",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;

        let mut series = Vec::new();
        for row in rows {
            let (month, count, value) = row?;
            if let Some((from, to)) = month_bounds(&month) {
                series.push(json!({"from": from, "to": to, "count": count, "value": value}));
            }
        }
        Ok(Value::Array(series))
    })
}

/// Monthly share of direct awards and public tenders among signed contracts.
pub fn procedure_type_time_series(store: &SqliteStore) -> Result<Value> {
    store.query(|conn| {
        let mut stmt = conn.prepare(
            "SELECT strftime('%Y-%m', c.signing_date) AS month,
                    COUNT(*),
                    SUM(p.name LIKE 'Ajuste Direto%'),
                    SUM(p.name LIKE 'Concurso%')
             FROM contracts c LEFT JOIN procedure_types p ON p.id = c.procedure_type_id
             WHERE c.signing_date IS NOT NULL
             GROUP BY month ORDER BY month",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            ))
        })?;

        let mut series = Vec::new();
        for row in rows {
            let (month, count, direct, tender) = row?;
            if let Some((from, to)) = month_bounds(&month) {
                series.push(json!({
                    "from": from,
                    "to": to,
                    "direct": direct as f64 / count as f64,
                    "tender": tender as f64 / count as f64,
                }));
            }
        }
        Ok(Value::Array(series))
    })
}

/// Monthly number of contracts made by entities whose name starts with `prefix`.
pub fn entities_contracts_time_series(store: &SqliteStore, prefix: &str) -> Result<Value> {
    let pattern = format!("{prefix}%");
    store.query(|conn| {
        let mut stmt = conn.prepare(
            "SELECT strftime('%Y-%m', c.signing_date) AS month, COUNT(DISTINCT c.id)
             FROM contracts c
             JOIN contract_contractors p ON p.contract_id = c.id
             JOIN entities e ON e.id = p.entity_id
             WHERE e.name LIKE ?1 AND c.signing_date IS NOT NULL
             GROUP BY month ORDER BY month",
        )?;
        let rows = stmt.query_map(params![pattern], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut series = Vec::new();
        for row in rows {
            let (month, count) = row?;
            if let Some((from, to)) = month_bounds(&month) {
                series.push(json!({"from": from, "to": to, "count": count}));
            }
        }
        Ok(Value::Array(series))
    })
}
