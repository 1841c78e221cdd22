// src/executor/lock.rs

//! Exclusive lock on a build working directory
//!
//! Only one plan may run in a working directory at a time. The executor
//! holds a [`WorkdirLock`] for the whole plan; the lock is an `flock` on
//! `.distpack.lock` inside the directory and is released when the guard is
//! dropped, on every exit path. The lock file itself is left in place.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the lock file inside a working directory
pub const LOCK_FILE_NAME: &str = ".distpack.lock";

/// Held exclusive lock on a working directory
#[derive(Debug)]
pub struct WorkdirLock {
    file: File,
    path: PathBuf,
}

impl WorkdirLock {
    fn open(dir: &Path) -> Result<(File, PathBuf)> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        Ok((file, path))
    }

    /// Acquire the lock, blocking until it is free
    pub fn acquire(dir: &Path) -> Result<Self> {
        let (file, path) = Self::open(dir)?;
        file.lock_exclusive()
            .map_err(|e| Error::IoError(format!("Failed to lock {}: {}", path.display(), e)))?;
        debug!("Acquired working directory lock at {}", path.display());
        Ok(Self { file, path })
    }

    /// Try to acquire the lock without blocking
    ///
    /// Returns `Ok(None)` when another process or plan holds it.
    pub fn try_acquire(dir: &Path) -> Result<Option<Self>> {
        let (file, path) = Self::open(dir)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired working directory lock at {}", path.display());
                Ok(Some(Self { file, path }))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                debug!("Working directory lock already held at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(Error::IoError(format!(
                "Failed to try-lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkdirLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_excludes_second_holder() {
        let dir = TempDir::new().unwrap();
        let held = WorkdirLock::acquire(dir.path()).unwrap();
        assert!(held.path().ends_with(LOCK_FILE_NAME));
        assert!(WorkdirLock::try_acquire(dir.path()).unwrap().is_none());

        drop(held);
        assert!(WorkdirLock::try_acquire(dir.path()).unwrap().is_some());
    }

    #[test]
    fn test_lock_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("work/app");
        let _lock = WorkdirLock::acquire(&nested).unwrap();
        assert!(nested.join(LOCK_FILE_NAME).exists());
    }
}
