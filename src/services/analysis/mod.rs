//! Analysis cache layer.
//!
//! An analysis is a named pure function over the store with its own TTL.
//! `get` serves the cached result while it is unexpired and computes it
//! synchronously on a miss. Two concurrent misses may both compute; the
//! function is pure and the write idempotent, so the second one only wastes
//! work.

mod functions;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::context::Context;
use crate::error::{AppError, Result};
use crate::storage::{CacheBackend, SqliteStore};

pub use functions::builtin;

pub type AnalysisFn = Arc<dyn Fn(&SqliteStore) -> Result<Value> + Send + Sync>;

/// A named computation and how long its result stays valid.
#[derive(Clone)]
pub struct Analysis {
    pub name: String,
    pub ttl: Duration,
    function: AnalysisFn,
}

impl Analysis {
    pub fn new(
        name: impl Into<String>,
        ttl: Duration,
        function: impl Fn(&SqliteStore) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            ttl,
            function: Arc::new(function),
        }
    }

    pub fn compute(&self, store: &SqliteStore) -> Result<Value> {
        (self.function)(store)
    }
}

/// A materialised analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisCacheEntry {
    pub value: Value,
    /// Hex SHA-256 of the serialized value.
    pub digest: String,
    pub computed_at: DateTime<Utc>,
}

impl AnalysisCacheEntry {
    fn new(value: Value) -> Result<Self> {
        let digest = hex::encode(Sha256::digest(serde_json::to_vec(&value)?));
        Ok(Self {
            value,
            digest,
            computed_at: Utc::now(),
        })
    }
}

pub fn cache_key(name: &str) -> String {
    format!("analysis>{name}")
}

/// Registry of analyses backed by a [`CacheBackend`].
pub struct AnalysisCache {
    store: Arc<SqliteStore>,
    cache: Arc<dyn CacheBackend>,
    analyses: BTreeMap<String, Analysis>,
}

impl AnalysisCache {
    pub fn new(store: Arc<SqliteStore>, cache: Arc<dyn CacheBackend>) -> Self {
        Self {
            store,
            cache,
            analyses: BTreeMap::new(),
        }
    }

    /// Registry with every built-in analysis.
    pub fn with_defaults(ctx: &Context) -> Self {
        let mut registry = Self::new(Arc::clone(&ctx.store), Arc::clone(&ctx.cache));
        for analysis in builtin() {
            registry.register(analysis);
        }
        registry
    }

    /// Register (or replace) an analysis by name.
    pub fn register(&mut self, analysis: Analysis) {
        self.analyses.insert(analysis.name.clone(), analysis);
    }

    pub fn names(&self) -> Vec<&str> {
        self.analyses.keys().map(String::as_str).collect()
    }

    fn analysis(&self, name: &str) -> Result<&Analysis> {
        self.analyses
            .get(name)
            .ok_or_else(|| AppError::UnknownAnalysis(name.to_string()))
    }

    /// Cached value, computed on a miss.
    pub async fn get(&self, name: &str) -> Result<Value> {
        Ok(self.entry(name).await?.value)
    }

    /// Cached entry with its digest, computed on a miss.
    pub async fn entry(&self, name: &str) -> Result<AnalysisCacheEntry> {
        self.analysis(name)?;
        if let Some(cached) = self.cache.get(&cache_key(name)).await {
            match serde_json::from_value(cached) {
                Ok(entry) => return Ok(entry),
                Err(e) => log::warn!("Discarding malformed analysis entry '{}': {}", name, e),
            }
        }
        self.update(name).await
    }

    /// Recompute and store, regardless of what is cached.
    pub async fn update(&self, name: &str) -> Result<AnalysisCacheEntry> {
        let analysis = self.analysis(name)?;
        log::info!("Updating analysis '{}'", name);

        let entry = AnalysisCacheEntry::new(analysis.compute(&self.store)?)?;
        self.cache
            .set(&cache_key(name), serde_json::to_value(&entry)?, analysis.ttl)
            .await;
        Ok(entry)
    }

    /// Force recomputation on the next `get`.
    pub async fn invalidate(&self, name: &str) -> Result<()> {
        self.analysis(name)?;
        self.cache.delete(&cache_key(name)).await;
        Ok(())
    }

    /// Recompute every registered analysis. Returns how many were updated.
    pub async fn update_all(&self) -> Result<usize> {
        let names: Vec<String> = self.analyses.keys().cloned().collect();
        for name in &names {
            self.update(name).await?;
        }
        Ok(names.len())
    }
}
