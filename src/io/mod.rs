//! Reading input layers and writing results.
//!
//! - `geojson` - FeatureCollection parsing and serialization
//! - `layers` - domain layers (streets, demands, lots, alignments) and run outputs
//! - `summary` - feature count / geometry mix / attribute listing of a layer

pub mod geojson;
pub mod layers;
pub mod summary;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Replace `target` with `bytes` through a temp file in the same directory,
/// so readers never see a partial layer. Refuses to overwrite unless `force`.
pub fn write_replacing(target: &Path, bytes: &[u8], force: bool) -> Result<()> {
    if !force && target.exists() {
        bail!("Refusing to overwrite existing file: {} (use --force)", target.display());
    }
    let dir = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    ensure_dir_exists(dir)?;

    let mut tmp = NamedTempFile::new_in(dir).context("create temp file")?;
    tmp.write_all(bytes).with_context(|| format!("write {}", target.display()))?;
    tmp.as_file().sync_all().ok(); // best-effort fsync file
    tmp.persist(target)
        .with_context(|| format!("rename to {}", target.display()))?;
    let _ = File::open(dir).and_then(|f| f.sync_all());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("layer.json");
        write_replacing(&path, b"one", false).unwrap();
        assert!(write_replacing(&path, b"two", false).is_err());
        write_replacing(&path, b"two", true).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn file_in_place_of_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, b"x").unwrap();
        assert!(ensure_dir_exists(&file).is_err());
    }
}
