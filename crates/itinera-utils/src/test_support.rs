//! Shared fixtures for tests across the workspace (enabled by `test-utils`).

use crate::cache::ResultCache;
use camino::Utf8PathBuf;
use tempfile::TempDir;

/// A `ResultCache` rooted in a fresh temp directory.
///
/// Keep the returned `TempDir` alive for as long as the cache is used.
#[must_use]
pub fn temp_cache() -> (TempDir, ResultCache) {
    let dir = TempDir::new().expect("create temp cache dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().join("cache")).expect("utf-8 temp path");
    (dir, ResultCache::new(root))
}
