//! Service layer for the synchronizer.
//!
//! This module contains the business logic for:
//! - Upstream access (`BaseClient`) and snapshot-first reads (`RecordSource`)
//! - Record cleaning (`Validator`)
//! - Incremental synchronization (`Synchronizer`)
//! - Derived data (`AggregateRecomputer`, `AnalysisCache`)
//! - Static lookup lists (`StaticDataCrawler`)

pub mod aggregates;
pub mod analysis;
pub mod breaker;
pub mod source;
pub mod static_data;
pub mod synchronizer;
pub mod upstream;
pub mod validate;

pub use aggregates::{AggregateRecomputer, RecomputeScope};
pub use analysis::{Analysis, AnalysisCache, AnalysisCacheEntry};
pub use breaker::ConsecutiveFailureBreaker;
pub use source::RecordSource;
pub use static_data::{StaticDataCrawler, StaticDataReport};
pub use synchronizer::{SyncOptions, SyncStart, Synchronizer};
pub use upstream::{BaseClient, Upstream};
pub use validate::Validator;
