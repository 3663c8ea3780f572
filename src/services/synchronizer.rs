// src/services/synchronizer.rs

//! Incremental synchronizer.
//!
//! Walks the ExternalID space of one record kind upward from a resume point,
//! fetching (snapshot-first), validating and upserting each id. The run ends
//! when a run of consecutive per-ID failures reaches the kind's threshold.
//!
//! Per-ID failures (upstream errors, not-found, validation) are counted and
//! logged; storage failures abort the run. A contract or tender id that
//! upstream reports as not-found but exists locally is deleted together with
//! its snapshot.

use std::time::Duration;

use crate::context::Context;
use crate::error::{AppError, Result};
use crate::models::{RecordKind, SyncReport, SyncState, Upserted};
use crate::services::breaker::ConsecutiveFailureBreaker;
use crate::services::source::RecordSource;
use crate::services::validate::Validator;

/// Where a run starts. The first id visited is the resume point plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStart {
    /// One below the cursor, re-checking the last known record.
    Resume,
    /// `n` below the cursor; a negative `n` counts as zero.
    Offset(i64),
    /// Right after the given id.
    From(i64),
    /// From the beginning of the id space.
    Bootstrap,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub start: SyncStart,
    /// Ignore snapshots and refetch every id.
    pub flush: bool,
    /// Overrides the configured threshold for the kind.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            start: SyncStart::Resume,
            flush: false,
            max_consecutive_failures: None,
        }
    }
}

/// Synchronizer for one record kind.
pub struct Synchronizer<'a> {
    ctx: &'a Context,
    kind: RecordKind,
    source: RecordSource,
    state: SyncState,
}

impl<'a> Synchronizer<'a> {
    pub fn new(ctx: &'a Context, kind: RecordKind) -> Self {
        Self {
            ctx,
            kind,
            source: ctx.source(),
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    fn transition(&mut self, state: SyncState) {
        log::debug!("{} sync: {} -> {}", self.kind, self.state, state);
        self.state = state;
    }

    /// Highest locally known ExternalID, across the store and the snapshots.
    pub async fn cursor(&self) -> Result<i64> {
        let stored = self.ctx.store.max_base_id(self.kind)?;
        let snapshot = self.ctx.snapshots.last_id(self.kind).await?;
        Ok(stored.max(snapshot).unwrap_or(0))
    }

    async fn resume_from(&self, start: SyncStart) -> Result<i64> {
        let resume_from = match start {
            SyncStart::Resume => self.cursor().await? - 1,
            SyncStart::Offset(n) => self.cursor().await? - n.max(0),
            SyncStart::From(id) => id,
            SyncStart::Bootstrap => 0,
        };
        Ok(resume_from.max(0))
    }

    /// Fetch, validate and upsert one id.
    pub async fn update_instance(&mut self, id: i64, flush: bool) -> Result<Upserted> {
        self.transition(SyncState::Fetching(id));
        let raw = self.source.get_cached_or_fetch(self.kind, id, flush).await?;

        self.transition(SyncState::Validating(id));
        let validator = Validator::new(&self.ctx.store, &self.source);
        let record = validator.clean(self.kind, &raw).await?;

        self.transition(SyncState::Persisting(id));
        self.ctx.store.upsert(&record)
    }

    /// Drop the local record and snapshot of an id upstream no longer has.
    ///
    /// Only renumbered kinds are removed; an entity keeps its row, snapshot
    /// and associations.
    async fn remove_local(&self, id: i64) -> Result<bool> {
        if !self.kind.is_renumbered() {
            return Ok(false);
        }
        let deleted = self.ctx.store.delete_record(self.kind, id)?;
        self.ctx.snapshots.remove(self.kind, id).await?;
        Ok(deleted)
    }

    /// Run until the consecutive-failure threshold is reached.
    pub async fn run(&mut self, options: &SyncOptions) -> Result<SyncReport> {
        let resume_from = self.resume_from(options.start).await?;
        let threshold = options
            .max_consecutive_failures
            .unwrap_or_else(|| self.ctx.config.sync.max_consecutive_failures(self.kind));
        let delay = Duration::from_millis(self.ctx.config.crawler.request_delay_ms);

        log::info!(
            "Syncing {} from id {} (threshold {}, flush {})",
            self.kind.endpoint(),
            resume_from + 1,
            threshold,
            options.flush
        );

        let mut breaker = ConsecutiveFailureBreaker::new(threshold);
        let mut report = SyncReport::new(self.kind, resume_from + 1);
        let mut id = resume_from;

        while !breaker.check().is_open() {
            id += 1;
            report.last_id = id;

            match self.update_instance(id, options.flush).await {
                Ok(upserted) => {
                    if upserted.created {
                        log::info!("{} {} added", self.kind, id);
                        report.added.push(id);
                    } else {
                        report.updated.push(id);
                    }
                    breaker.record_success();
                }
                Err(e) if e.is_recoverable() => {
                    self.transition(SyncState::Failed(id));
                    match &e {
                        AppError::Upstream(err) if err.is_not_found() => {
                            report.failures.not_found += 1;
                            if self.remove_local(id).await? {
                                log::warn!("{} {} no longer exists upstream; deleted", self.kind, id);
                                report.deleted.push(id);
                            }
                        }
                        AppError::Validation(err) => {
                            report.failures.validation += 1;
                            log::error!("{}", err);
                        }
                        _ => {
                            report.failures.fetch += 1;
                            log::warn!("{} {} failed: {}", self.kind, id, e);
                        }
                    }
                    breaker.record_failure();
                }
                Err(e) => {
                    self.transition(SyncState::Failed(id));
                    return Err(e);
                }
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        self.transition(SyncState::Exhausted);
        report.finish(SyncState::Exhausted);
        log::info!(
            "{} sync exhausted at id {}: {} added, {} updated, {} deleted, {} failures",
            self.kind.endpoint(),
            report.last_id,
            report.added.len(),
            report.updated.len(),
            report.deleted.len(),
            report.failures.total()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeUpstream, contract_json, context, entity_json, seed_lookups, tender_json};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn options(start: SyncStart, flush: bool, threshold: u32) -> SyncOptions {
        SyncOptions {
            start,
            flush,
            max_consecutive_failures: Some(threshold),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_walks_until_threshold() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        for id in [1, 2, 4] {
            upstream.insert(RecordKind::Entity, id, entity_json(id, "e"));
        }
        let ctx = context(&tmp, upstream.clone());
        seed_lookups(&ctx.store);

        let mut sync = Synchronizer::new(&ctx, RecordKind::Entity);
        let report = sync.run(&options(SyncStart::Bootstrap, false, 2)).await.unwrap();

        // 3 is a single gap; 5 and 6 exhaust the run.
        assert_eq!(report.added, vec![1, 2, 4]);
        assert_eq!(report.failures.not_found, 3);
        assert_eq!(report.last_id, 6);
        assert_eq!(report.state, SyncState::Exhausted);
        assert_eq!(sync.state(), SyncState::Exhausted);
        assert_eq!(upstream.calls(RecordKind::Entity, 7), 0);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        for id in 1..=5 {
            upstream.insert(RecordKind::Entity, id, entity_json(id, "e"));
        }
        let ctx = context(&tmp, upstream);
        seed_lookups(&ctx.store);

        let mut sync = Synchronizer::new(&ctx, RecordKind::Entity);
        let first = sync.run(&options(SyncStart::Bootstrap, false, 2)).await.unwrap();
        assert_eq!(first.added.len(), 5);

        let second = sync.run(&options(SyncStart::Resume, false, 2)).await.unwrap();
        assert_eq!(second.first_id, 5);
        assert!(second.added.is_empty());
        assert_eq!(second.updated, vec![5]);
        assert_eq!(ctx.store.count(RecordKind::Entity).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_negative_offset_does_not_skip_past_cursor() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        for id in 1..=5 {
            upstream.insert(RecordKind::Entity, id, entity_json(id, "e"));
        }
        let ctx = context(&tmp, upstream.clone());
        seed_lookups(&ctx.store);

        let mut sync = Synchronizer::new(&ctx, RecordKind::Entity);
        sync.run(&options(SyncStart::Bootstrap, false, 2)).await.unwrap();
        upstream.insert(RecordKind::Entity, 6, entity_json(6, "e"));

        let report = sync.run(&options(SyncStart::Offset(-5), false, 2)).await.unwrap();
        assert_eq!(report.first_id, 6);
        assert_eq!(report.added, vec![6]);
    }

    #[tokio::test]
    async fn test_renumbered_contract_is_deleted_and_added() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 1, entity_json(1, "Município"));
        upstream.insert(RecordKind::Entity, 2, entity_json(2, "Empresa"));
        for id in 7..=10 {
            upstream.insert(RecordKind::Contract, id, contract_json(id, "100,00 €", &[1], &[2]));
        }
        let ctx = context(&tmp, upstream.clone());
        seed_lookups(&ctx.store);

        // 7, 8 and 9 are already known locally.
        let mut sync = Synchronizer::new(&ctx, RecordKind::Contract);
        for id in 7..=9 {
            sync.update_instance(id, false).await.unwrap();
        }

        let report = sync.run(&options(SyncStart::From(7), false, 2)).await.unwrap();
        assert_eq!(report.added, vec![10]);
        assert!(report.deleted.is_empty());

        // Upstream renumbers 10 to 11.
        upstream.remove(RecordKind::Contract, 10);
        upstream.insert(RecordKind::Contract, 11, contract_json(11, "100,00 €", &[1], &[2]));

        let report = sync.run(&options(SyncStart::From(7), true, 2)).await.unwrap();
        assert_eq!(report.deleted, vec![10]);
        assert_eq!(report.added, vec![11]);
        assert!(!ctx.store.exists(RecordKind::Contract, 10).unwrap());
        assert!(!tmp.path().join("contratos/10.json").exists());
        assert_eq!(ctx.store.count(RecordKind::Contract).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_missing_entity_keeps_contract_parties() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 1, entity_json(1, "Município"));
        upstream.insert(RecordKind::Entity, 2, entity_json(2, "Empresa"));
        upstream.insert(RecordKind::Contract, 1, contract_json(1, "100,00 €", &[1], &[2]));
        let ctx = context(&tmp, upstream.clone());
        seed_lookups(&ctx.store);

        let mut contracts = Synchronizer::new(&ctx, RecordKind::Contract);
        contracts.update_instance(1, false).await.unwrap();

        upstream.remove(RecordKind::Entity, 2);
        let mut entities = Synchronizer::new(&ctx, RecordKind::Entity);
        let report = entities.run(&options(SyncStart::Bootstrap, true, 2)).await.unwrap();

        assert!(report.deleted.is_empty());
        assert!(ctx.store.exists(RecordKind::Entity, 2).unwrap());
        assert!(tmp.path().join("entidades/2.json").exists());

        let entity = ctx.store.record_id(RecordKind::Entity, 2).unwrap().unwrap();
        assert_eq!(ctx.store.entity_aggregate(entity).unwrap().map(|a| a.is_fresh), Some(false));
        let links: i64 = ctx
            .store
            .query(|conn| conn.query_row("SELECT COUNT(*) FROM contract_contracted", [], |row| row.get(0)))
            .unwrap();
        assert_eq!(links, 1);

        // The contract still revalidates from its snapshot and the entity snapshot.
        assert!(!contracts.update_instance(1, false).await.unwrap().created);
    }

    #[tokio::test]
    async fn test_validation_and_fetch_failures_are_counted() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 1, entity_json(1, "a"));
        upstream.insert(RecordKind::Entity, 2, serde_json::json!({"id": 2}));
        upstream.fail(RecordKind::Entity, 3);
        upstream.insert(RecordKind::Entity, 4, entity_json(4, "b"));
        let ctx = context(&tmp, upstream);
        seed_lookups(&ctx.store);

        let mut sync = Synchronizer::new(&ctx, RecordKind::Entity);
        let report = sync.run(&options(SyncStart::Bootstrap, false, 3)).await.unwrap();

        assert_eq!(report.added, vec![1, 4]);
        assert_eq!(report.failures.validation, 1);
        assert_eq!(report.failures.fetch, 1);
        assert_eq!(report.failures.not_found, 3);
        assert!(!tmp.path().join("entidades/3.json").exists());
    }

    #[tokio::test]
    async fn test_malformed_deadline_does_not_abort_run() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 1, entity_json(1, "a"));
        let mut bad = tender_json(5, &[1]);
        bad["proposalDeadline"] = "200000000000000 dias.".into();
        upstream.insert(RecordKind::Tender, 5, bad);
        upstream.insert(RecordKind::Tender, 6, tender_json(6, &[1]));
        let ctx = context(&tmp, upstream);
        seed_lookups(&ctx.store);

        let mut sync = Synchronizer::new(&ctx, RecordKind::Tender);
        assert!(matches!(
            sync.update_instance(5, false).await,
            Err(AppError::Validation(_))
        ));

        let report = sync.run(&options(SyncStart::From(4), false, 2)).await.unwrap();
        assert_eq!(report.failures.validation, 1);
        assert_eq!(report.added, vec![6]);
    }

    #[tokio::test]
    async fn test_new_contract_marks_entities_stale() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 1, entity_json(1, "a"));
        upstream.insert(RecordKind::Entity, 2, entity_json(2, "b"));
        upstream.insert(RecordKind::Contract, 1, contract_json(1, "5,00 €", &[1], &[2]));
        let ctx = context(&tmp, upstream);
        seed_lookups(&ctx.store);

        let mut sync = Synchronizer::new(&ctx, RecordKind::Contract);
        sync.run(&options(SyncStart::Bootstrap, false, 1)).await.unwrap();

        assert_eq!(ctx.store.entity_ids(true).unwrap().len(), 2);
    }
}
