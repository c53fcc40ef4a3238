//! Filesystem helpers for store directories

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Prefix of in-flight temporary files; store listings skip these
pub const TEMP_PREFIX: &str = ".odyssey-tmp";

/// Atomically publish `bytes` at `path`.
///
/// The payload is written to a temporary file in the destination directory,
/// flushed to disk, then renamed over the target. Readers observe either the
/// previous file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Whether a directory entry is a leftover temporary file
pub fn is_temp_file(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}
