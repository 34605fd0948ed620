//! Persistent TTL cache for BigQuery metadata.
//!
//! Three kinds of data share one key space, distinguished by namespace
//! prefix: table lists (`tables:`), schemas (`schema:`), and full table
//! metadata (`metadata:`). The durable [`SqliteCache`] survives process
//! restarts; [`MemoryCache`] offers the same semantics for tests and
//! embedding. Callers pick the backend at construction.

mod memory;
mod sqlite;
mod store;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use store::{CacheEntry, CacheError, CacheStats, CacheStore, Result};

use std::env;
use std::path::PathBuf;

/// Cache key for a dataset's table list: `tables:{project}.{dataset}`.
pub fn table_list_key(project: &str, dataset: &str) -> String {
    format!("tables:{project}.{dataset}")
}

/// Cache key for a table's schema: `schema:{project}.{dataset}.{table}`.
pub fn schema_key(project: &str, dataset: &str, table: &str) -> String {
    format!("schema:{project}.{dataset}.{table}")
}

/// Cache key for full table metadata: `metadata:{project}.{dataset}.{table}`.
pub fn metadata_key(project: &str, dataset: &str, table: &str) -> String {
    format!("metadata:{project}.{dataset}.{table}")
}

/// Resolve the cache directory following XDG conventions.
///
/// Priority: `BQS_CACHE_DIR`, then `XDG_CACHE_HOME` with a `bqs`
/// subdirectory, then `~/.cache/bqs`.
pub fn cache_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("BQS_CACHE_DIR") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    if let Some(xdg) = env::var_os("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("bqs"));
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".cache").join("bqs"))
        .ok_or(CacheError::NoCacheDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(table_list_key("p", "d"), "tables:p.d");
        assert_eq!(schema_key("p", "d", "t"), "schema:p.d.t");
        assert_eq!(metadata_key("p", "d", "t"), "metadata:p.d.t");
    }

    #[test]
    fn test_key_formats_with_real_identifiers() {
        assert_eq!(
            table_list_key("my-project", "analytics"),
            "tables:my-project.analytics"
        );
        assert_eq!(
            metadata_key("my-project", "analytics", "events_2024"),
            "metadata:my-project.analytics.events_2024"
        );
    }
}
