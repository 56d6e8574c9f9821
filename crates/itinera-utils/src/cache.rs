//! Content-addressed, file-backed result cache
//!
//! Entries live at `<cache_dir>/<kind>/<digest>.json` and hold the composed
//! result of a request together with its [`CacheKey`] and write time. The
//! cache is an optimization only: `get` never fails (an unreadable entry is a
//! miss) and `put` swallows write failures after logging them.
//!
//! Entries never expire. Invalidation is manual, by deleting files or calling
//! [`ResultCache::clear`]. Concurrent writers of the same key are
//! last-writer-wins; every write goes through [`write_file_atomic`] so readers
//! never observe a partial payload.

use crate::atomic_write::write_file_atomic;
use crate::canonicalization::CacheKey;
use crate::error::CacheError;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A single persisted result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub written_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Statistics for cache performance tracking
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub invalidations: usize,
    pub writes: usize,
    pub write_failures: usize,
}

impl CacheStats {
    /// Calculate cache hit ratio
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    invalidations: AtomicUsize,
    writes: AtomicUsize,
    write_failures: AtomicUsize,
}

/// File-backed idempotent store keyed by [`CacheKey`].
///
/// Shared by reference across concurrent requests; all methods take `&self`.
#[derive(Debug)]
pub struct ResultCache {
    cache_dir: Utf8PathBuf,
    counters: Counters,
}

impl ResultCache {
    /// Create a cache rooted at `cache_dir`. Directories are created lazily on
    /// the first write, so construction cannot fail.
    #[must_use]
    pub fn new(cache_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Utf8Path {
        &self.cache_dir
    }

    /// Path of the entry file for `key`
    #[must_use]
    pub fn entry_path(&self, key: &CacheKey) -> Utf8PathBuf {
        self.cache_dir
            .join(key.kind())
            .join(format!("{}.json", key.digest()))
    }

    /// Look up `key`. Missing, unreadable, corrupt or mismatched entries are
    /// all reported as `None`.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path, error = %e, "cache entry unreadable; treating as miss");
                }
                return self.miss(key);
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.key == *key => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, written_at = %entry.written_at, "cache hit");
                Some(entry)
            }
            Ok(entry) => {
                tracing::warn!(
                    path = %path,
                    expected = %key,
                    found = %entry.key,
                    "cache entry key mismatch; treating as miss"
                );
                self.invalidate(&path);
                self.miss(key)
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "cache entry corrupt; removing");
                self.invalidate(&path);
                self.miss(key)
            }
        }
    }

    /// Look up `key` and deserialize its payload. A payload that no longer
    /// matches `T` counts as a miss.
    pub fn get_payload<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entry = self.get(key)?;
        match serde_json::from_value(entry.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached payload has unexpected shape; ignoring");
                None
            }
        }
    }

    /// Store `payload` under `key`, overwriting any previous entry.
    ///
    /// Best-effort: failures are logged and counted, and `false` is returned.
    pub fn put<T: Serialize>(&self, key: &CacheKey, payload: &T) -> bool {
        match self.try_put(key, payload) {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "cache write");
                true
            }
            Err(e) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, error = %e, "cache write failed; continuing without cache");
                false
            }
        }
    }

    fn try_put<T: Serialize>(&self, key: &CacheKey, payload: &T) -> Result<(), CacheError> {
        let entry = CacheEntry {
            key: key.clone(),
            written_at: Utc::now(),
            payload: serde_json::to_value(payload)?,
        };
        let bytes = serde_json::to_vec_pretty(&entry)?;
        write_file_atomic(&self.entry_path(key), &bytes)
            .map_err(|e| CacheError::Io(std::io::Error::other(format!("{e:#}"))))?;
        Ok(())
    }

    /// Remove every entry of every kind and reset statistics.
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
        }
        for counter in [
            &self.counters.hits,
            &self.counters.misses,
            &self.counters.invalidations,
            &self.counters.writes,
            &self.counters.write_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Snapshot of hit/miss/write counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Log cache statistics at debug level
    pub fn log_stats(&self) {
        let stats = self.stats();
        if stats.hits + stats.misses > 0 {
            tracing::debug!(
                hits = stats.hits,
                misses = stats.misses,
                hit_rate = %format!("{:.1}%", stats.hit_ratio() * 100.0),
                invalidations = stats.invalidations,
                writes = stats.writes,
                write_failures = stats.write_failures,
                "cache stats"
            );
        }
    }

    fn miss<T>(&self, key: &CacheKey) -> Option<T> {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "cache miss");
        None
    }

    fn invalidate(&self, path: &Utf8Path) {
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        let _ = fs::remove_file(path);
    }
}
