//! Persistent key/value rows behind the cache backend.
//!
//! Values are JSON text; `expires_at` is a unix timestamp in milliseconds.

use rusqlite::{OptionalExtension, params};
use serde_json::Value;

use super::SqliteStore;
use crate::error::Result;

impl SqliteStore {
    /// Unexpired value under `key`. An expired row is removed.
    pub fn cache_get(&self, key: &str, now_ms: i64) -> Result<Option<(Value, i64)>> {
        let conn = self.conn()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((value, expires_at)) if expires_at > now_ms => {
                Ok(Some((serde_json::from_str(&value)?, expires_at)))
            }
            Some(_) => {
                conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn cache_set(&self, key: &str, value: &Value, expires_at_ms: i64) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.conn()?.execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, text, expires_at_ms],
        )?;
        Ok(())
    }

    pub fn cache_delete(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Drop every expired row. Returns how many were removed.
    pub fn purge_expired_cache(&self, now_ms: i64) -> Result<usize> {
        Ok(self
            .conn()?
            .execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now_ms])?)
    }
}
