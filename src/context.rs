//! Process-wide handles, built once by the entry point and passed down.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::models::Config;
use crate::services::source::RecordSource;
use crate::services::upstream::{BaseClient, Upstream};
use crate::storage::{CacheBackend, LocalSnapshots, PersistentCache, SnapshotStore, SqliteStore};

/// Configuration plus every external collaborator of the synchronizer.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub upstream: Arc<dyn Upstream>,
    pub cache: Arc<dyn CacheBackend>,
}

impl Context {
    pub fn new(
        config: Arc<Config>,
        store: Arc<SqliteStore>,
        snapshots: Arc<dyn SnapshotStore>,
        upstream: Arc<dyn Upstream>,
        cache: Arc<dyn CacheBackend>,
    ) -> Self {
        Self {
            config,
            store,
            snapshots,
            upstream,
            cache,
        }
    }

    /// Open the production collaborators, resolving relative paths against
    /// `base_path`.
    pub fn from_config(config: Config, base_path: &Path) -> Result<Self> {
        config.validate()?;

        let database = config.database_path(base_path);
        let snapshot_dir = config.snapshot_dir(base_path);
        log::debug!("Opening database {:?}", database);

        let store = Arc::new(SqliteStore::open(&database)?);
        let upstream = BaseClient::new(&config.crawler)?;
        let cache = PersistentCache::new(Arc::clone(&store), config.cache.max_capacity);

        Ok(Self::new(
            Arc::new(config),
            store,
            Arc::new(LocalSnapshots::new(snapshot_dir)),
            Arc::new(upstream),
            Arc::new(cache),
        ))
    }

    /// Snapshot-first source over this context's upstream.
    pub fn source(&self) -> RecordSource {
        RecordSource::new(Arc::clone(&self.upstream), Arc::clone(&self.snapshots))
    }
}
