// src/models/mod.rs

//! Domain models for the synchronizer.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod aggregate;
mod config;
mod record;
mod report;

// Re-export all public types
pub use aggregate::{CategoryAggregate, EntityAggregate};
pub use config::{CacheConfig, Config, CrawlerConfig, LoggingConfig, PathsConfig, SyncConfig};
pub use record::{
    CleanedRecord, ContractRecord, EntityRecord, LookupItem, RecordKind, TenderRecord, Upserted,
};
pub use report::{FailureCounts, SyncReport, SyncState};
