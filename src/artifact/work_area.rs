//! Scoped scratch directories for staged blobs

use crate::common::PathUtils;
use crate::error::Result;
use crate::logging::Logger;
use std::path::{Path, PathBuf};

/// A unique `root/<uuid>` directory owned by one artifact attempt.
///
/// Call [`WorkArea::release`] on every normal exit; dropping an unreleased area removes the
/// directory as well so error and cancellation paths do not leak staged blobs.
#[derive(Debug)]
pub struct WorkArea {
    path: PathBuf,
    released: bool,
}

impl WorkArea {
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(uuid::Uuid::new_v4().to_string());
        PathUtils::ensure_dir_exists(&path)?;
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subdirectory inside the area, created on demand
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.path.join(name);
        PathUtils::ensure_dir_exists(&dir)?;
        Ok(dir)
    }

    /// Remove the directory; failures are reported, not returned
    pub fn release(mut self, output: &Logger) {
        self.released = true;
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                output.warning(&format!(
                    "Failed to clean up {}: {}",
                    self.path.display(),
                    e
                ));
            }
        }
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn areas_are_unique_and_released() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkArea::acquire(root.path()).unwrap();
        let b = WorkArea::acquire(root.path()).unwrap();
        assert_ne!(a.path(), b.path());

        std::fs::write(a.path().join("blob"), b"x").unwrap();
        let a_path = a.path().to_path_buf();
        a.release(&Logger::new_quiet());
        assert!(!a_path.exists());

        let b_path = b.path().to_path_buf();
        drop(b);
        assert!(!b_path.exists());
    }
}
