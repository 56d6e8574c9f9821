use camino::Utf8PathBuf;
use std::cell::RefCell;

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Environment variable overriding the itinera home directory
pub const HOME_ENV: &str = "ITINERA_HOME";

/// Resolve itinera home:
/// 1) thread-local override (tests use this)
/// 2) env `ITINERA_HOME`
/// 3) default ".itinera"
#[must_use]
pub fn itinera_home() -> Utf8PathBuf {
    if let Some(tl) = THREAD_HOME.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var(HOME_ENV) {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from(".itinera")
}

/// Returns `<ITINERA_HOME>/cache`
#[must_use]
pub fn cache_dir() -> Utf8PathBuf {
    itinera_home().join("cache")
}

/// Returns `<ITINERA_HOME>/config.toml`
#[must_use]
pub fn home_config_path() -> Utf8PathBuf {
    itinera_home().join("config.toml")
}

/// mkdir -p; treat `AlreadyExists` as success (removes TOCTTOU races)
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// RAII guard for isolated home that clears thread-local state on drop
#[cfg(any(test, feature = "test-utils"))]
pub struct HomeGuard {
    inner: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        THREAD_HOME.with(|tl| *tl.borrow_mut() = None);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl std::ops::Deref for HomeGuard {
    type Target = tempfile::TempDir;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Test helper: gives the current thread a unique home under the system temp dir.
///
/// Hold the `HomeGuard` for the test's duration so the directory stays alive.
#[cfg(any(test, feature = "test-utils"))]
#[must_use]
pub fn with_isolated_home() -> HomeGuard {
    let td = tempfile::TempDir::new().expect("create temp home");
    let p = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf-8 temp path");
    THREAD_HOME.with(|tl| *tl.borrow_mut() = Some(p));
    HomeGuard { inner: td }
}
