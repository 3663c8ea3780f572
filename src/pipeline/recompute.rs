// src/pipeline/recompute.rs

use crate::context::Context;
use crate::error::Result;
use crate::services::{AggregateRecomputer, AnalysisCache, RecomputeScope};
use crate::utils::log;

/// What a recompute run touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeTargets {
    /// Entity aggregates to sweep, if any.
    pub entities: Option<RecomputeScope>,
    pub categories: bool,
    pub analyses: bool,
    /// Analyses to update when `analyses` is set; empty means all.
    pub analysis_names: Vec<String>,
}

impl RecomputeTargets {
    /// Everything, with entities limited to `scope`.
    pub fn all(scope: RecomputeScope) -> Self {
        Self {
            entities: Some(scope),
            categories: true,
            analyses: true,
            analysis_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeSummary {
    pub entities: usize,
    pub categories: usize,
    pub analyses: usize,
}

pub async fn run_recompute(ctx: &Context, targets: &RecomputeTargets) -> Result<RecomputeSummary> {
    let mut summary = RecomputeSummary::default();
    let recomputer = AggregateRecomputer::new(ctx);

    let purged = ctx.store.purge_expired_cache(chrono::Utc::now().timestamp_millis())?;
    if purged > 0 {
        log::sub_item(&format!("Expired cache entries: {purged} removed"));
    }

    if let Some(scope) = targets.entities {
        summary.entities = recomputer.recompute_all(scope).await?;
        log::sub_item(&format!("Entity aggregates: {} recomputed", summary.entities));
    }

    if targets.categories {
        summary.categories = recomputer.recompute_categories().await?;
        log::sub_item(&format!("Category aggregates: {} recomputed", summary.categories));
    }

    if targets.analyses {
        let analyses = AnalysisCache::with_defaults(ctx);
        summary.analyses = if targets.analysis_names.is_empty() {
            analyses.update_all().await?
        } else {
            for name in &targets.analysis_names {
                analyses.update(name).await?;
            }
            targets.analysis_names.len()
        };
        log::sub_item(&format!("Analyses: {} updated", summary.analyses));
    }

    Ok(summary)
}
