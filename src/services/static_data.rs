//! Static lookup-data crawler.
//!
//! Fills the lookup tables the validators resolve names against. Items with
//! id `0` ("all") are skipped and rows already present are left untouched, so
//! every step can be rerun safely.

use crate::context::Context;
use crate::error::{AppError, Result};
use crate::models::LookupItem;
use crate::storage::LookupTable;

/// Upstream id of Portugal in the country list.
const PORTUGAL_BASE_ID: i64 = 187;

/// Rows inserted per lookup table by a crawl.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StaticDataReport {
    pub contract_types: usize,
    pub procedure_types: usize,
    pub act_types: usize,
    pub model_types: usize,
    pub countries: usize,
    pub districts: usize,
    pub councils: usize,
}

impl StaticDataReport {
    pub fn total(&self) -> usize {
        self.contract_types
            + self.procedure_types
            + self.act_types
            + self.model_types
            + self.countries
            + self.districts
            + self.councils
    }
}

pub struct StaticDataCrawler<'a> {
    ctx: &'a Context,
}

fn usable(items: Vec<LookupItem>) -> impl Iterator<Item = (i64, String)> {
    items.into_iter().filter_map(|item| match item.base_id() {
        Some(0) | None => None,
        Some(id) => Some((id, item.description)),
    })
}

impl<'a> StaticDataCrawler<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    async fn items(&self, path: &str) -> Result<Vec<LookupItem>> {
        Ok(self.ctx.upstream.fetch_lookup(path).await?)
    }

    async fn save_lookup(&self, table: LookupTable) -> Result<usize> {
        let mut inserted = 0;
        for (id, name) in usable(self.items(table.endpoint()).await?) {
            if self.ctx.store.insert_lookup(table, id, &name)? {
                inserted += 1;
            }
        }
        log::info!("{}: {} new", table.table(), inserted);
        Ok(inserted)
    }

    pub async fn save_contract_types(&self) -> Result<usize> {
        self.save_lookup(LookupTable::ContractType).await
    }

    pub async fn save_procedure_types(&self) -> Result<usize> {
        self.save_lookup(LookupTable::ProcedureType).await
    }

    pub async fn save_act_types(&self) -> Result<usize> {
        self.save_lookup(LookupTable::ActType).await
    }

    pub async fn save_model_types(&self) -> Result<usize> {
        self.save_lookup(LookupTable::ModelType).await
    }

    /// Countries are keyed by name; the list carries no usable id.
    pub async fn save_countries(&self) -> Result<usize> {
        let mut inserted = 0;
        for item in self.items("lista/paises").await? {
            if self.ctx.store.insert_country(&item.description)? {
                inserted += 1;
            }
        }
        log::info!("countries: {} new", inserted);
        Ok(inserted)
    }

    /// Districts of Portugal. Requires the country to be present.
    pub async fn save_districts(&self) -> Result<usize> {
        let portugal = self
            .ctx
            .store
            .country_id("Portugal")?
            .ok_or_else(|| AppError::config("country 'Portugal' missing; crawl countries first"))?;

        let path = format!("lista/distritos?pais={PORTUGAL_BASE_ID}");
        let mut inserted = 0;
        for (id, name) in usable(self.items(&path).await?) {
            if self.ctx.store.insert_district(id, &name, portugal)? {
                inserted += 1;
            }
        }
        log::info!("districts: {} new", inserted);
        Ok(inserted)
    }

    /// Councils of every stored district.
    pub async fn save_councils(&self) -> Result<usize> {
        let mut inserted = 0;
        for district in self.ctx.store.districts()? {
            let path = format!("lista/concelhos?distrito={}", district.base_id);
            for (id, name) in usable(self.items(&path).await?) {
                if self.ctx.store.insert_council(id, &name, district.id)? {
                    inserted += 1;
                }
            }
        }
        log::info!("councils: {} new", inserted);
        Ok(inserted)
    }

    pub async fn save_all(&self) -> Result<StaticDataReport> {
        Ok(StaticDataReport {
            contract_types: self.save_contract_types().await?,
            procedure_types: self.save_procedure_types().await?,
            act_types: self.save_act_types().await?,
            model_types: self.save_model_types().await?,
            countries: self.save_countries().await?,
            districts: self.save_districts().await?,
            councils: self.save_councils().await?,
        })
    }
}
