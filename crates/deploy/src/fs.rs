//! File system utils.

use std::{io::Write, path::Path};

use anyhow::Context;

pub struct FsHandler;

impl FsHandler {
    /// Create the parent directory of `path` if it doesn't exist.
    pub fn create_parent_directory(path: &Path) -> anyhow::Result<()> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory {}", parent.display()))?;
            tracing::debug!("Created directory: {}", parent.display());
        }

        Ok(())
    }

    /// Replace the content of `path` as a whole.
    ///
    /// The content is written to a temporary file in the same directory and renamed over the
    /// target, so readers never observe a partially written file.
    pub fn write_atomic(path: &Path, content: &[u8]) -> anyhow::Result<()> {
        Self::create_parent_directory(path)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir)
            .context(format!("Failed to create temporary file in {}", dir.display()))?;
        file.write_all(content)
            .context(format!("Failed to write temporary file for {}", path.display()))?;
        file.persist(path)
            .map_err(|e| e.error)
            .context(format!("Failed to replace {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = TempDir::new("accountable-fs").unwrap();
        let path = dir.path().join("constants/abi.json");

        FsHandler::write_atomic(&path, b"[]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = TempDir::new("accountable-fs").unwrap();
        let path = dir.path().join("abi.json");
        std::fs::write(&path, "original content").unwrap();

        FsHandler::write_atomic(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
