// src/pipeline/validate.rs

use std::path::Path;

use crate::config::load_all;
use crate::error::Result;
use crate::models::{Config, RecordKind};
use crate::utils::log;

/// Load and validate the configuration under `base_path`, logging the
/// effective values.
pub fn run_validate(base_path: &Path) -> Result<Config> {
    log::header("Validating configuration");

    match load_all(base_path) {
        Ok(config) => {
            log::success("Config OK");
            log::sub_item(&format!("User agent: {}", config.crawler.user_agent));
            log::sub_item(&format!("Timeout: {}s", config.crawler.timeout_secs));
            log::sub_item(&format!("Base URL: {}", config.crawler.base_url));
            for kind in RecordKind::ALL {
                log::sub_item(&format!(
                    "{} threshold: {}",
                    kind.endpoint(),
                    config.sync.max_consecutive_failures(kind)
                ));
            }
            log::sub_item(&format!("Database: {}", config.database_path(base_path).display()));
            log::sub_item(&format!("Snapshots: {}", config.snapshot_dir(base_path).display()));
            Ok(config)
        }
        Err(e) => {
            log::error(&format!("Validation failed: {e}"));
            Err(e)
        }
    }
}
