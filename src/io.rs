use std::{io::Write, path::Path};

use miette::{Context, IntoDiagnostic, Result};
use tempfile::NamedTempFile;

/// Replace the content of the file at `path` in one step.
///
/// The data is written to a temporary file next to the target and then
/// renamed over it, so a reader sees either the old or the new content.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not create a temporary file in {}", dir.display()))?;

    tmp.write_all(data)
        .into_diagnostic()
        .wrap_err("Could not write the temporary file")?;
    tmp.as_file()
        .sync_all()
        .into_diagnostic()
        .wrap_err("Could not flush the temporary file")?;

    tmp.persist(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not move the temporary file to {}", path.display()))?;
    Ok(())
}

/// Whether a non-empty file exists at the path
pub fn is_nonempty_file(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
