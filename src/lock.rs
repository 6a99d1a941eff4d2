//! Single-instance lock so only one lapsetr drives the camera at a time.
//!
//! The lock file is opened without truncation and only rewritten once the
//! exclusive lock is held, so a second instance can still read the PID of the
//! running one.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::LOCK_FILE_NAME;

/// Held exclusive lock on the lock file. Released by [`InstanceLock::release`] or on drop.
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// `$XDG_RUNTIME_DIR/lapsetr.lock`, or under `/tmp` when the runtime dir is unset.
    pub fn default_path() -> PathBuf {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(runtime_dir).join(LOCK_FILE_NAME)
    }

    /// Try to take the lock.
    ///
    /// # Returns
    /// - `Ok(Some(lock))` if this process now holds the lock
    /// - `Ok(None)` if another instance holds it
    /// - `Err` if the lock file cannot be opened or written
    pub fn acquire(path: &Path) -> Result<Option<Self>> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }

        file.set_len(0).context("Failed to truncate lock file")?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id()).context("Failed to write lock file")?;
        file.flush()?;

        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    /// PID recorded in a lock file, if it holds one.
    pub fn read_owner_pid(path: &Path) -> Option<u32> {
        fs::read_to_string(path)
            .ok()?
            .lines()
            .next()?
            .trim()
            .parse()
            .ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock and remove the lock file.
    pub fn release(self) -> Result<()> {
        let Self { file, path } = self;
        drop(file);
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove lock file {}", path.display()))
    }
}
