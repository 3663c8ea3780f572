// src/config.rs

//! Configuration loading utilities.
//!
//! The CLI reads `{base}/data/config.toml`. A missing file falls back to
//! defaults; a file that cannot be parsed, or whose values fail validation,
//! is rejected.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::Config;

/// Default config location relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "data/config.toml";

pub fn config_path(base_path: &Path) -> PathBuf {
    base_path.join(DEFAULT_CONFIG_PATH)
}

/// Load and validate the configuration under `base_path`.
pub fn load_all(base_path: &Path) -> Result<Config> {
    let config = Config::load_or_default(config_path(base_path))?;
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration: {e}")))?;
    Ok(config)
}
