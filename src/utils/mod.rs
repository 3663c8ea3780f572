//! Utility functions and helpers.

pub mod http;
pub mod log;

use url::Url;

use crate::error::Result;

/// Join `path` onto an API root, keeping the root's own path segments.
///
/// `Url::join` drops the last segment unless the base ends with `/`.
pub fn join_api_url(base: &str, path: &str) -> Result<Url> {
    let mut root = Url::parse(base)?;
    if !root.path().ends_with('/') {
        let with_slash = format!("{}/", root.path());
        root.set_path(&with_slash);
    }
    Ok(root.join(path.trim_start_matches('/'))?)
}
