//! Filesystem primitives shared across features.

use anyhow::Context;
use std::fs;
use std::path::Path;

/// Replace `path` with `bytes` atomically (tmp + rename).
///
/// Parent directories are created as needed. The temp file lives next to the
/// target so the rename never crosses filesystems.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Path has no parent: {}", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Path has no file name: {}", path.display()))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    fs::write(&tmp_path, bytes)
        .with_context(|| format!("Failed to write tmp file: {}", tmp_path.display()))?;

    // Windows refuses to rename over an existing file
    if cfg!(windows) && path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove existing file: {}", path.display()))?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to rename tmp file: {}", tmp_path.display()))?;

    Ok(())
}
