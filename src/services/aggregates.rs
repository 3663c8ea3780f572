//! Entity and category aggregate recomputation.
//!
//! Association changes only mark entity aggregates stale; this module brings
//! them current again, either one at a time or in a sweep.
//!
//! The per-entity contract-id list is cached for 30 days. A stale aggregate
//! bypasses that cache and refreshes it, so the list never outlives an
//! association change that has not been recomputed yet.

use std::time::Duration;

use serde_json::json;

use crate::context::Context;
use crate::error::Result;
use crate::models::{CategoryAggregate, EntityAggregate};
use crate::storage::{CacheBackend, SqliteStore};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// TTL of the per-entity contract-id list.
pub const CONTRACT_IDS_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// TTL of a category aggregate.
pub const CATEGORY_TTL: Duration = DAY;

/// Which entities a sweep recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeScope {
    All,
    Stale,
}

pub fn contract_ids_key(entity_id: i64) -> String {
    format!("entity>contracts_ids>{entity_id}")
}

pub fn category_key(category_id: i64) -> String {
    format!("category>aggregate>{category_id}")
}

pub struct AggregateRecomputer<'a> {
    store: &'a SqliteStore,
    cache: &'a dyn CacheBackend,
}

impl<'a> AggregateRecomputer<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            store: &ctx.store,
            cache: ctx.cache.as_ref(),
        }
    }

    /// Recompute one entity, store it as fresh and refresh its contract-id
    /// list.
    pub async fn recompute(&self, entity_id: i64) -> Result<EntityAggregate> {
        let aggregate = self.store.refresh_entity_aggregate(entity_id)?;
        let ids = self.store.entity_contract_ids(entity_id)?;
        self.cache
            .set(&contract_ids_key(entity_id), json!(ids), CONTRACT_IDS_TTL)
            .await;
        Ok(aggregate)
    }

    /// Sweep over every entity, or only the stale ones. Returns how many were
    /// recomputed.
    pub async fn recompute_all(&self, scope: RecomputeScope) -> Result<usize> {
        let ids = self.store.entity_ids(scope == RecomputeScope::Stale)?;
        let total = ids.len();
        for (i, entity_id) in ids.into_iter().enumerate() {
            self.recompute(entity_id).await?;
            if (i + 1) % 1000 == 0 {
                log::info!("Recomputed {}/{} entity aggregates", i + 1, total);
            }
        }
        Ok(total)
    }

    /// Contract ids of an entity, newest signing first.
    pub async fn contract_ids(&self, entity_id: i64, flush: bool) -> Result<Vec<i64>> {
        let key = contract_ids_key(entity_id);
        let fresh = self
            .store
            .entity_aggregate(entity_id)?
            .is_some_and(|aggregate| aggregate.is_fresh);

        if fresh && !flush {
            if let Some(cached) = self.cache.get(&key).await {
                match serde_json::from_value(cached) {
                    Ok(ids) => return Ok(ids),
                    Err(e) => log::warn!("Discarding malformed cache entry {}: {}", key, e),
                }
            }
        }

        let ids = self.store.entity_contract_ids(entity_id)?;
        self.cache.set(&key, json!(ids), CONTRACT_IDS_TTL).await;
        Ok(ids)
    }

    pub async fn recompute_category(&self, category_id: i64) -> Result<CategoryAggregate> {
        let aggregate = self.store.category_aggregate(category_id)?;
        self.cache
            .set(&category_key(category_id), serde_json::to_value(aggregate)?, CATEGORY_TTL)
            .await;
        Ok(aggregate)
    }

    /// Cached category aggregate, recomputed on a miss or flush.
    pub async fn category_aggregate(&self, category_id: i64, flush: bool) -> Result<CategoryAggregate> {
        if !flush {
            if let Some(cached) = self.cache.get(&category_key(category_id)).await {
                if let Ok(aggregate) = serde_json::from_value(cached) {
                    return Ok(aggregate);
                }
            }
        }
        self.recompute_category(category_id).await
    }

    pub async fn recompute_categories(&self) -> Result<usize> {
        let categories = self.store.categories()?;
        for (category_id, _code) in &categories {
            self.recompute_category(*category_id).await?;
        }
        Ok(categories.len())
    }
}
