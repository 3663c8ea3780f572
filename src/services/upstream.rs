// src/services/upstream.rs

//! Upstream BASE REST API client.
//!
//! Single GETs only: `{base_url}/{entidades|contratos|anuncios}/{id}` for
//! records and `{base_url}/lista/...` for static lookup lists.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{JsonError, Result};
use crate::models::{CrawlerConfig, LookupItem, RecordKind};
use crate::utils::http::{create_async_client, fetch};
use crate::utils::join_api_url;

/// Source of raw upstream documents.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Fetch one record, `JsonError::NotFound` for the `{"id": 0}` placeholder.
    async fn fetch_record(&self, kind: RecordKind, id: i64) -> std::result::Result<Value, JsonError>;

    /// Fetch a lookup list (`{"items": [...]}`) relative to the API root.
    async fn fetch_lookup(&self, path: &str) -> std::result::Result<Vec<LookupItem>, JsonError>;
}

#[derive(Deserialize)]
struct LookupList {
    #[serde(default)]
    items: Vec<LookupItem>,
}

/// Whether upstream answered with its not-found placeholder.
pub fn is_placeholder(value: &Value) -> bool {
    match value.get("id") {
        Some(Value::Number(n)) => n.as_i64() == Some(0),
        Some(Value::String(s)) => s.trim() == "0",
        _ => false,
    }
}

/// reqwest-backed client for the BASE API.
pub struct BaseClient {
    client: Client,
    base_url: String,
}

impl BaseClient {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        // Fail early on a base URL that cannot be joined.
        join_api_url(&config.base_url, "")?;
        Ok(Self {
            client: create_async_client(config)?,
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, path: &str) -> std::result::Result<String, JsonError> {
        join_api_url(&self.base_url, path)
            .map(|u| u.to_string())
            .map_err(|e| JsonError::ConnectionFailed {
                url: format!("{}{}", self.base_url, path),
                message: e.to_string(),
            })
    }

    /// GET `url` and parse it as JSON.
    pub async fn fetch_json(&self, url: &str) -> std::result::Result<Value, JsonError> {
        let body = fetch(&self.client, url).await?;
        parse_json(url, &body)
    }
}

fn parse_json(url: &str, body: &str) -> std::result::Result<Value, JsonError> {
    let value: Value = serde_json::from_str(body).map_err(|e| JsonError::ParseFailure {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    if is_placeholder(&value) {
        return Err(JsonError::NotFound {
            url: url.to_string(),
        });
    }
    Ok(value)
}

#[async_trait]
impl Upstream for BaseClient {
    async fn fetch_record(&self, kind: RecordKind, id: i64) -> std::result::Result<Value, JsonError> {
        let url = self.url(&format!("{}/{}", kind.endpoint(), id))?;
        log::debug!("GET {}", url);
        self.fetch_json(&url).await
    }

    async fn fetch_lookup(&self, path: &str) -> std::result::Result<Vec<LookupItem>, JsonError> {
        let url = self.url(path)?;
        log::debug!("GET {}", url);
        let value = self.fetch_json(&url).await?;
        let list: LookupList = serde_json::from_value(value).map_err(|e| JsonError::ParseFailure {
            url: url.clone(),
            message: e.to_string(),
        })?;
        Ok(list.items)
    }
}
