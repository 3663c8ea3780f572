//! Pipeline entry points for synchronizer operations.
//!
//! - `run_static`: Crawl the static lookup lists
//! - `run_sync`: Synchronize entities, contracts and tenders
//! - `run_recompute`: Bring aggregates and analyses current
//! - `run_pipeline`: All of the above, in order
//! - `run_validate`: Check the configuration

pub mod pipeline;
pub mod recompute;
pub mod static_data;
pub mod sync;
pub mod validate;

pub use pipeline::{PipelineOptions, run_pipeline};
pub use recompute::{RecomputeSummary, RecomputeTargets, run_recompute};
pub use static_data::run_static;
pub use sync::run_sync;
pub use validate::run_validate;
