//! Small filesystem helpers shared across modules.

use std::path::Path;

use anyhow::{Context, Result};

/// Replace `path` with `contents` atomically.
///
/// Writes to a temporary file in the same directory and renames it into
/// place, so readers never observe a half-written file.
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    std::io::Write::write_all(&mut file, contents.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
