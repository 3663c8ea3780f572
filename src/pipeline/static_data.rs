// src/pipeline/static_data.rs

use crate::context::Context;
use crate::error::Result;
use crate::services::{StaticDataCrawler, StaticDataReport};
use crate::storage::LookupTable;
use crate::utils::log;

/// Whether any lookup list has never been crawled.
pub fn needs_static(ctx: &Context) -> Result<bool> {
    for table in LookupTable::ALL {
        if ctx.store.lookup_count(table)? == 0 {
            return Ok(true);
        }
    }
    Ok(ctx.store.country_count()? == 0 || ctx.store.council_count()? == 0)
}

/// Crawl the static lookup lists, unless they are already populated.
pub async fn run_static(ctx: &Context, force: bool) -> Result<StaticDataReport> {
    if !force && !needs_static(ctx)? {
        log::info("Static data already present; use --force to recrawl.");
        return Ok(StaticDataReport::default());
    }

    let report = StaticDataCrawler::new(ctx).save_all().await?;
    log::summary(
        "Static data",
        &[
            ("Contract types", report.contract_types.to_string()),
            ("Procedure types", report.procedure_types.to_string()),
            ("Act types", report.act_types.to_string()),
            ("Model types", report.model_types.to_string()),
            ("Countries", report.countries.to_string()),
            ("Districts", report.districts.to_string()),
            ("Councils", report.councils.to_string()),
        ],
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeUpstream, context, seed_lookups};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_skips_when_populated() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        let ctx = context(&tmp, upstream.clone());
        seed_lookups(&ctx.store);

        let report = run_static(&ctx, false).await.unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(upstream.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_store_needs_static() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, Arc::new(FakeUpstream::new()));
        assert!(needs_static(&ctx).unwrap());
    }
}
