//! Snapshot-first record source.
//!
//! Reads the local snapshot unless a flush is requested; otherwise fetches
//! upstream and persists the raw document before returning it.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::models::RecordKind;
use crate::services::upstream::Upstream;
use crate::storage::SnapshotStore;

#[derive(Clone)]
pub struct RecordSource {
    upstream: Arc<dyn Upstream>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl RecordSource {
    pub fn new(upstream: Arc<dyn Upstream>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            upstream,
            snapshots,
        }
    }

    /// Raw document for `(kind, id)`.
    ///
    /// Upstream failures come back as `AppError::Upstream`; snapshot write
    /// failures are storage errors and abort the caller.
    pub async fn get_cached_or_fetch(&self, kind: RecordKind, id: i64, flush: bool) -> Result<Value> {
        if !flush {
            match self.snapshots.load(kind, id).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Unreadable snapshot for {} {}, refetching: {}", kind, id, e);
                }
            }
        }

        let value = self.upstream.fetch_record(kind, id).await?;
        self.snapshots.save(kind, id, &value).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalSnapshots;
    use crate::testing::FakeUpstream;
    use serde_json::json;
    use tempfile::TempDir;

    fn source(tmp: &TempDir, upstream: Arc<FakeUpstream>) -> RecordSource {
        RecordSource::new(upstream, Arc::new(LocalSnapshots::new(tmp.path())))
    }

    #[tokio::test]
    async fn test_snapshot_short_circuits_network() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 5, json!({"id": 5, "description": "v1"}));
        let source = source(&tmp, upstream.clone());

        let first = source.get_cached_or_fetch(RecordKind::Entity, 5, false).await.unwrap();
        upstream.insert(RecordKind::Entity, 5, json!({"id": 5, "description": "v2"}));
        let second = source.get_cached_or_fetch(RecordKind::Entity, 5, false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(upstream.calls(RecordKind::Entity, 5), 1);
        assert!(tmp.path().join("entidades/5.json").exists());
    }

    #[tokio::test]
    async fn test_flush_refetches_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 5, json!({"id": 5, "description": "v1"}));
        let source = source(&tmp, upstream.clone());
        source.get_cached_or_fetch(RecordKind::Entity, 5, false).await.unwrap();

        upstream.insert(RecordKind::Entity, 5, json!({"id": 5, "description": "v2"}));
        let flushed = source.get_cached_or_fetch(RecordKind::Entity, 5, true).await.unwrap();
        assert_eq!(flushed["description"], "v2");

        let cached = source.get_cached_or_fetch(RecordKind::Entity, 5, false).await.unwrap();
        assert_eq!(cached["description"], "v2");
        assert_eq!(upstream.calls(RecordKind::Entity, 5), 2);
    }

    #[tokio::test]
    async fn test_not_found_writes_no_snapshot() {
        let tmp = TempDir::new().unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        let source = source(&tmp, upstream);

        let err = source.get_cached_or_fetch(RecordKind::Contract, 3, false).await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(!tmp.path().join("contratos/3.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_refetched() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("entidades")).unwrap();
        std::fs::write(tmp.path().join("entidades/8.json"), "{not json").unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        upstream.insert(RecordKind::Entity, 8, json!({"id": 8}));
        let source = source(&tmp, upstream.clone());

        let value = source.get_cached_or_fetch(RecordKind::Entity, 8, false).await.unwrap();
        assert_eq!(value, json!({"id": 8}));
        assert_eq!(upstream.calls(RecordKind::Entity, 8), 1);
    }
}
