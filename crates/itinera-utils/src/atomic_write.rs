//! Atomic file writes: temp file in the target directory, fsync, rename.
//!
//! A reader either sees the previous file or the complete new one, never a
//! partially written payload. On Windows the rename is retried briefly because
//! antivirus scanners and indexers hold short-lived locks on fresh files.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

#[cfg(target_os = "windows")]
use std::{thread, time::Duration};

/// Result of an atomic write operation
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Number of rename retries that occurred (Windows only)
    pub rename_retry_count: u32,
    /// Bytes written to the target
    pub bytes_written: usize,
}

/// Atomically write `content` to `path`, creating parent directories.
pub fn write_file_atomic(path: &Utf8Path, content: &[u8]) -> Result<AtomicWriteResult> {
    let temp_dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    crate::paths::ensure_dir_all(temp_dir)
        .with_context(|| format!("Failed to create parent directory: {temp_dir}"))?;

    let mut temp_file = NamedTempFile::new_in(temp_dir)
        .with_context(|| format!("Failed to create temporary file in: {temp_dir}"))?;

    temp_file
        .write_all(content)
        .with_context(|| "Failed to write content to temporary file")?;
    temp_file
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync temporary file")?;

    let rename_retry_count = atomic_rename(temp_file, path.as_std_path())
        .with_context(|| format!("Failed to atomically write file: {path}"))?;

    Ok(AtomicWriteResult {
        rename_retry_count,
        bytes_written: content.len(),
    })
}

/// Persist with bounded exponential backoff (at most 250ms in total).
#[cfg(target_os = "windows")]
fn atomic_rename(mut temp_file: NamedTempFile, target: &Path) -> Result<u32> {
    use std::io::ErrorKind;

    const MAX_RETRIES: u32 = 5;
    const INITIAL_DELAY_MS: u64 = 10;
    const MAX_TOTAL_DELAY_MS: u64 = 250;

    let mut retry_count = 0;
    let mut total_delay_ms = 0;

    loop {
        match temp_file.persist(target) {
            Ok(_) => return Ok(retry_count),
            Err(persist_error) => {
                let retryable = matches!(
                    persist_error.error.kind(),
                    ErrorKind::PermissionDenied | ErrorKind::Other
                );
                let delay_ms = INITIAL_DELAY_MS * 2_u64.pow(retry_count);
                if !retryable
                    || retry_count >= MAX_RETRIES
                    || total_delay_ms + delay_ms > MAX_TOTAL_DELAY_MS
                {
                    return Err(anyhow::anyhow!(persist_error.error));
                }

                thread::sleep(Duration::from_millis(delay_ms));
                total_delay_ms += delay_ms;
                retry_count += 1;
                temp_file = persist_error.file;
            }
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn atomic_rename(temp_file: NamedTempFile, target: &Path) -> Result<u32> {
    temp_file
        .persist(target)
        .map(|_| 0)
        .map_err(|e| anyhow::anyhow!(e.error))
}
