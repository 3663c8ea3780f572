//! Storage abstractions.
//!
//! - `SnapshotStore`: raw upstream JSON, one document per `(kind, id)`
//! - `SqliteStore`: the relational store of validated records and aggregates
//! - `CacheBackend`: key → value with per-key TTL for derived data
//!   (`MemoryCache`, `PersistentCache`)
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── base.sqlite3          # Relational store
//! └── snapshots/            # Write-through raw JSON
//!     ├── entidades/{id}.json
//!     ├── contratos/{id}.json
//!     └── anuncios/{id}.json
//! ```

pub mod cache;
pub mod snapshots;
pub mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::RecordKind;

// Re-export for convenience
pub use cache::{MemoryCache, PersistentCache};
pub use snapshots::LocalSnapshots;
pub use sqlite::{District, LookupTable, PartyRole, SqliteStore};

/// Durable raw-JSON snapshots keyed by kind and ExternalID.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot, `None` if none was ever written.
    async fn load(&self, kind: RecordKind, id: i64) -> Result<Option<Value>>;

    /// Persist (or replace) the snapshot.
    async fn save(&self, kind: RecordKind, id: i64, value: &Value) -> Result<()>;

    /// Remove the snapshot, returning whether one existed.
    async fn remove(&self, kind: RecordKind, id: i64) -> Result<bool>;

    /// Highest ExternalID with a snapshot.
    async fn last_id(&self, kind: RecordKind) -> Result<Option<i64>>;
}

/// Key → value store with per-key expiration.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Duration);

    async fn delete(&self, key: &str);
}
