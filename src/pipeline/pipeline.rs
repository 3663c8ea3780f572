// src/pipeline/pipeline.rs

use crate::context::Context;
use crate::error::Result;
use crate::models::{RecordKind, SyncReport};
use crate::services::{RecomputeScope, SyncOptions};
use crate::utils::log;

use super::recompute::{RecomputeSummary, RecomputeTargets, run_recompute};
use super::static_data::{needs_static, run_static};
use super::sync::run_sync;

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub sync: SyncOptions,
    /// Recrawl static lookups even when present.
    pub force_static: bool,
}

/// Run the full pipeline.
pub async fn run_pipeline(
    ctx: &Context,
    options: &PipelineOptions,
) -> Result<(Vec<SyncReport>, RecomputeSummary)> {
    log::header("BASE synchronization pipeline");

    let run_static_step = options.force_static || needs_static(ctx)?;
    let total_steps = if run_static_step { 3 } else { 2 };
    let mut current_step = 1;

    if run_static_step {
        log::step(current_step, total_steps, "Static - Crawling lookup lists");
        run_static(ctx, true).await?;
        current_step += 1;
    }

    log::step(current_step, total_steps, "Sync - Entities, contracts and tenders");
    let reports = run_sync(ctx, &RecordKind::ALL, &options.sync).await?;
    current_step += 1;

    log::step(current_step, total_steps, "Recompute - Aggregates and analyses");
    let summary = run_recompute(ctx, &RecomputeTargets::all(RecomputeScope::Stale)).await?;

    log::success("Pipeline complete");

    Ok((reports, summary))
}
