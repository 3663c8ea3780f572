//! Local filesystem snapshot store.
//!
//! Write-through cache of raw upstream JSON, one file per record. The
//! snapshot is the system of record for replay and debugging, independent of
//! the relational store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── entidades/
//! │   └── {id}.json
//! ├── contratos/
//! │   └── {id}.json
//! └── anuncios/
//!     └── {id}.json
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::RecordKind;
use crate::storage::SnapshotStore;

/// Local filesystem snapshot backend.
#[derive(Debug, Clone)]
pub struct LocalSnapshots {
    root_dir: PathBuf,
}

impl LocalSnapshots {
    /// Create a new store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn kind_dir(&self, kind: RecordKind) -> PathBuf {
        self.root_dir.join(kind.endpoint())
    }

    /// Get the full path for a record snapshot.
    fn path(&self, kind: RecordKind, id: i64) -> PathBuf {
        self.kind_dir(kind).join(format!("{id}.json"))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalSnapshots {
    async fn load(&self, kind: RecordKind, id: i64) -> Result<Option<Value>> {
        match self.read_bytes(&self.path(kind, id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, kind: RecordKind, id: i64, value: &Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(&self.path(kind, id), &bytes).await
    }

    async fn remove(&self, kind: RecordKind, id: i64) -> Result<bool> {
        match tokio::fs::remove_file(self.path(kind, id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn last_id(&self, kind: RecordKind) -> Result<Option<i64>> {
        let mut entries = match tokio::fs::read_dir(self.kind_dir(kind)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut last = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<i64>().ok())
            else {
                continue;
            };
            last = Some(last.map_or(id, |l: i64| l.max(id)));
        }
        Ok(last)
    }
}
