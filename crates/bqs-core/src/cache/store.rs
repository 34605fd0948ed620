//! Cache store trait and types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from the cache layer itself.
///
/// A miss is not an error; `get` models it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("cache io error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache directory could not be determined")]
    NoCacheDir,

    #[error("cache lock poisoned")]
    Poisoned,
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// One cached result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unique identifier, `"{namespace}:{project}.{dataset}[.{table}]"`.
    pub key: String,
    /// Serialized payload; the caller owns the format.
    pub data: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Reserved for future conditional-fetch support.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: u64,
    /// `total_entries - expired_entries` at the instant of computation.
    pub valid_entries: u64,
    pub expired_entries: u64,
    /// Storage footprint in bytes.
    pub size_bytes: u64,
}

/// Namespaced, expiring key-value storage.
///
/// Implementations synchronize internally; each operation is atomic in
/// isolation and same-key races resolve last-write-wins. Dropping a store
/// releases its underlying resources.
pub trait CacheStore: Send + Sync {
    /// Return the entry for `key` if present and not expired.
    ///
    /// An expired row is a miss even while it still physically exists.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or fully replace the entry for `key`, durable on return.
    ///
    /// `None` TTL uses the store-wide default fixed at construction.
    fn set(&self, key: &str, data: &str, ttl: Option<Duration>, etag: Option<&str>) -> Result<()>;

    /// Whether a valid (non-expired) entry exists, without reading the payload.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Remove the entry unconditionally. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Remove all entries.
    fn clear(&self) -> Result<()>;

    /// Remove expired entries, returning how many were removed.
    fn cleanup(&self) -> Result<u64>;

    /// Compute aggregate counts and storage size.
    fn stats(&self) -> Result<CacheStats>;
}
