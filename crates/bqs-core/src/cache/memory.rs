//! In-memory cache store.

use super::store::{CacheEntry, CacheError, CacheStats, CacheStore, Result};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Cache store backed by a process-local map.
///
/// Observably identical to [`super::SqliteCache`] minus durability; used
/// as a test double and for embedding without a filesystem.
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Utc::now())
            .cloned())
    }

    fn set(&self, key: &str, data: &str, ttl: Option<Duration>, etag: Option<&str>) -> Result<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Utc::now();
        let expires_at = now + ChronoDuration::from_std(ttl).unwrap_or_default();

        let entry = CacheEntry {
            key: key.to_string(),
            data: data.to_string(),
            created_at: now,
            expires_at,
            etag: etag.map(str::to_string),
        };

        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.get(key).map(|entry| entry.is_some())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.clear();
        Ok(())
    }

    fn cleanup(&self) -> Result<u64> {
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok((before - entries.len()) as u64)
    }

    fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now();
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;

        let total = entries.len() as u64;
        let expired = entries
            .values()
            .filter(|entry| entry.expires_at <= now)
            .count() as u64;
        let size_bytes = entries.values().map(|entry| entry.data.len() as u64).sum();

        Ok(CacheStats {
            total_entries: total,
            valid_entries: total - expired,
            expired_entries: expired,
            size_bytes,
        })
    }
}
