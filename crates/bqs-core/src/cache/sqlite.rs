//! SQLite-backed cache store.

use super::store::{CacheEntry, CacheError, CacheStats, CacheStore, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Durable cache store on a single SQLite database.
///
/// Thread-safe via an internal mutex on the connection; WAL journaling
/// keeps concurrent readers cheap. Dropping the store closes the
/// connection.
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
    default_ttl: Duration,
}

impl SqliteCache {
    /// Open (or create) the cache at the resolved cache directory,
    /// `<cache_dir>/metadata.db`.
    pub fn open_default(default_ttl: Duration) -> Result<Self> {
        let dir = super::cache_dir()?;
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            message: format!("failed to create cache directory {}", dir.display()),
            source: e,
        })?;
        Self::open(dir.join("metadata.db"), default_ttl)
    }

    /// Open (or create) a cache database at an explicit path.
    pub fn open(db_path: impl AsRef<Path>, default_ttl: Duration) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                message: format!("failed to create cache directory {}", parent.display()),
                source: e,
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| CacheError::Database {
            message: format!("failed to open cache database: {e}"),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| CacheError::Database {
                message: format!("failed to set pragmas: {e}"),
                source: Some(e),
            })?;

        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
            default_ttl,
        };
        cache.init_schema()?;

        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS metadata_cache (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                etag TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_expires_at ON metadata_cache(expires_at);
            CREATE INDEX IF NOT EXISTS idx_created_at ON metadata_cache(created_at);
            "#,
        )
        .map_err(|e| CacheError::Database {
            message: format!("failed to initialize cache schema: {e}"),
            source: Some(e),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

impl CacheStore for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.lock()?;
        let now = Utc::now().timestamp();

        let row: Option<(String, String, i64, i64, String)> = conn
            .query_row(
                r#"
                SELECT key, data, created_at, expires_at, COALESCE(etag, '')
                FROM metadata_cache
                WHERE key = ?1 AND expires_at > ?2
                "#,
                params![key, now],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| CacheError::Database {
                message: format!("failed to get cache entry: {e}"),
                source: Some(e),
            })?;

        Ok(row.map(|(key, data, created_at, expires_at, etag)| CacheEntry {
            key,
            data,
            created_at: from_unix(created_at),
            expires_at: from_unix(expires_at),
            etag: if etag.is_empty() { None } else { Some(etag) },
        }))
    }

    fn set(&self, key: &str, data: &str, ttl: Option<Duration>, etag: Option<&str>) -> Result<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.as_secs() as i64;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO metadata_cache
            (key, data, created_at, expires_at, etag)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![key, data, now, expires_at, etag.unwrap_or("")],
        )
        .map_err(|e| CacheError::Database {
            message: format!("failed to set cache entry: {e}"),
            source: Some(e),
        })?;

        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let now = Utc::now().timestamp();

        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM metadata_cache WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CacheError::Database {
                message: format!("failed to check cache entry: {e}"),
                source: Some(e),
            })?;

        Ok(found.is_some())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM metadata_cache WHERE key = ?1", params![key])
            .map_err(|e| CacheError::Database {
                message: format!("failed to delete cache entry: {e}"),
                source: Some(e),
            })?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM metadata_cache", [])
            .map_err(|e| CacheError::Database {
                message: format!("failed to clear cache: {e}"),
                source: Some(e),
            })?;
        Ok(())
    }

    fn cleanup(&self) -> Result<u64> {
        let conn = self.lock()?;
        let now = Utc::now().timestamp();

        let removed = conn
            .execute(
                "DELETE FROM metadata_cache WHERE expires_at <= ?1",
                params![now],
            )
            .map_err(|e| CacheError::Database {
                message: format!("failed to cleanup cache: {e}"),
                source: Some(e),
            })?;

        if removed > 0 {
            // Reclaim disk space after dropping expired rows.
            conn.execute_batch("VACUUM").map_err(|e| CacheError::Database {
                message: format!("failed to vacuum cache: {e}"),
                source: Some(e),
            })?;
            debug!("cleaned up {} expired cache entries", removed);
        }

        Ok(removed as u64)
    }

    fn stats(&self) -> Result<CacheStats> {
        let conn = self.lock()?;
        let now = Utc::now().timestamp();

        let db_err = |e: rusqlite::Error| CacheError::Database {
            message: format!("failed to compute cache stats: {e}"),
            source: Some(e),
        };

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM metadata_cache", [], |row| row.get(0))
            .map_err(db_err)?;

        let expired: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM metadata_cache WHERE expires_at <= ?1",
                params![now],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        let page_count: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .map_err(db_err)?;
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .map_err(db_err)?;

        Ok(CacheStats {
            total_entries: total as u64,
            valid_entries: (total - expired) as u64,
            expired_entries: expired as u64,
            size_bytes: (page_count * page_size) as u64,
        })
    }
}
