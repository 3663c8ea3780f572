// src/pipeline/sync.rs

use crate::context::Context;
use crate::error::Result;
use crate::models::{RecordKind, SyncReport};
use crate::services::{SyncOptions, Synchronizer};
use crate::utils::log;

/// Synchronize `kinds` one after another with the same options.
pub async fn run_sync(
    ctx: &Context,
    kinds: &[RecordKind],
    options: &SyncOptions,
) -> Result<Vec<SyncReport>> {
    let mut reports = Vec::with_capacity(kinds.len());

    for (i, kind) in kinds.iter().enumerate() {
        log::step(i + 1, kinds.len(), &format!("Sync - {}", kind.endpoint()));
        let report = Synchronizer::new(ctx, *kind).run(options).await?;
        log::summary(
            kind.endpoint(),
            &[
                ("Visited", format!("{}..={}", report.first_id, report.last_id)),
                ("Added", report.added.len().to_string()),
                ("Updated", report.updated.len().to_string()),
                ("Deleted", report.deleted.len().to_string()),
                ("Not found", report.failures.not_found.to_string()),
                ("Fetch failures", report.failures.fetch.to_string()),
                ("Invalid", report.failures.validation.to_string()),
            ],
        );
        reports.push(report);
    }

    Ok(reports)
}
